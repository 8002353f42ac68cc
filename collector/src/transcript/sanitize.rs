/// Rewrites a Python `repr()` payload into JSON.
///
/// Never fails: text that is not a Python literal (`matches.`, error messages)
/// passes through with its quotes normalized and is left for the caller to
/// interpret.
///
/// - `u'..'` string prefixes are dropped
/// - single quoted strings become double quoted strings
/// - bare `True`, `False` and `None` become `true`, `false` and `"None"`
/// - `\x` escapes become `\\x` so that shard container names survive decoding
pub fn sanitize(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 16);
    let mut pos = 0;
    while pos < payload.len() {
        match payload[pos] {
            b'\'' | b'"' => pos = copy_string(payload, pos, &mut out),
            b'u' if is_string_prefix(payload, pos) => pos += 1,
            b'\\' if payload.get(pos + 1) == Some(&b'x') => {
                out.extend_from_slice(br"\\x");
                pos += 2;
            }
            byte if is_word_byte(byte) && !preceded_by_word(payload, pos) => {
                let end = payload[pos..]
                    .iter()
                    .position(|b| !is_word_byte(*b))
                    .map_or(payload.len(), |len| pos + len);
                match &payload[pos..end] {
                    b"True" => out.extend_from_slice(b"true"),
                    b"False" => out.extend_from_slice(b"false"),
                    b"None" => out.extend_from_slice(br#""None""#),
                    word => out.extend_from_slice(word),
                }
                pos = end;
            }
            byte => {
                out.push(byte);
                pos += 1;
            }
        }
    }
    out
}

/// Copies the string literal starting at `start` as a JSON string and returns
/// the position right after its closing quote. An unterminated literal is
/// closed at the end of the payload.
fn copy_string(payload: &[u8], start: usize, out: &mut Vec<u8>) -> usize {
    let quote = payload[start];
    out.push(b'"');
    let mut pos = start + 1;
    while pos < payload.len() {
        match (payload[pos], payload.get(pos + 1)) {
            (byte, _) if byte == quote => {
                out.push(b'"');
                return pos + 1;
            }
            (b'\\', Some(b'x')) => {
                out.extend_from_slice(br"\\x");
                pos += 2;
            }
            (b'\\', Some(b'\'')) => {
                out.push(b'\'');
                pos += 2;
            }
            (b'\\', Some(escaped)) => {
                out.push(b'\\');
                out.push(*escaped);
                pos += 2;
            }
            (b'\\', None) => {
                out.extend_from_slice(br"\\");
                pos += 1;
            }
            (b'"', _) => {
                out.extend_from_slice(br#"\""#);
                pos += 1;
            }
            (byte, _) => {
                out.push(byte);
                pos += 1;
            }
        }
    }
    out.push(b'"');
    pos
}

fn is_string_prefix(payload: &[u8], pos: usize) -> bool {
    matches!(payload.get(pos + 1), Some(b'\'' | b'"')) && !preceded_by_word(payload, pos)
}

fn preceded_by_word(payload: &[u8], pos: usize) -> bool {
    pos > 0 && is_word_byte(payload[pos - 1])
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sanitized(payload: &str) -> String {
        String::from_utf8(sanitize(payload.as_bytes())).unwrap()
    }

    #[test]
    fn rewrites_disk_usage_record() {
        assert_eq!(
            sanitized("[{u'device': u'sdb-14', u'avail': 5608006787072, u'mounted': True, u'used': None}]"),
            r#"[{"device": "sdb-14", "avail": 5608006787072, "mounted": true, "used": "None"}]"#
        );
    }

    #[test]
    fn quoted_none_is_not_quoted_twice() {
        assert_eq!(
            sanitized("{'error': 'None', 'state': None}"),
            r#"{"error": "None", "state": "None"}"#
        );
    }

    #[test]
    fn keywords_inside_strings_are_kept() {
        assert_eq!(
            sanitized("{'container': 'True-False-None', 'ok': False}"),
            r#"{"container": "True-False-None", "ok": false}"#
        );
        assert_eq!(sanitized("{'name': 'menu'}"), r#"{"name": "menu"}"#);
        assert_eq!(sanitized("{'Nonesuch': Truest}"), r#"{"Nonesuch": Truest}"#);
    }

    #[test]
    fn escapes_hex_sequences() {
        let out = sanitized(r"{'container': '.shards_AUTH_test\x2dc1-2'}");
        assert_eq!(out, r#"{"container": ".shards_AUTH_test\\x2dc1-2"}"#);

        let decoded: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(decoded["container"], r".shards_AUTH_test\x2dc1-2");
    }

    #[test]
    fn double_quoted_repr_strings_are_kept() {
        assert_eq!(
            sanitized(r#"{'msg': "it's done", 'quote': 'say "hi"'}"#),
            r#"{"msg": "it's done", "quote": "say \"hi\""}"#
        );
        assert_eq!(sanitized(r"{'msg': 'it\'s'}"), r#"{"msg": "it's"}"#);
    }

    #[test]
    fn free_text_survives() {
        assert_eq!(sanitized("matches."), "matches.");
        assert_eq!(sanitized("<urlopen error timed out>"), "<urlopen error timed out>");
        assert!(sanitized("(/path/to/swift.conf => 54321) doesn't match on disk md5sum").contains(r#"doesn"t match"#));
    }
}
