use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    static ref CHECKSUM_BLOCK: Regex = Regex::new(
        r"(?m-u)^.* Checking ([\.a-zA-Z0-9_]+) md5sums?\s*((?:(?:->|!!).*\n)*)\s*[0-9]+/[0-9]+ hosts matched, [0-9]+ error.*$"
    )
    .expect("checksum block pattern");
}

/// The host lines printed for one checksum kind (`ring`, `swift.conf`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumBlock {
    pub kind: String,
    pub body: Vec<u8>,
}

/// Cuts an `--md5` transcript into one block per checksum kind.
pub fn md5_blocks(transcript: &[u8]) -> Vec<ChecksumBlock> {
    CHECKSUM_BLOCK
        .captures_iter(transcript)
        .map(|captures| ChecksumBlock {
            kind: String::from_utf8_lossy(&captures[1]).into_owned(),
            body: captures[2].to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::{
        fixtures,
        split_per_host,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_one_block_per_kind() {
        let blocks = md5_blocks(fixtures::RECON_MD5_WITH_ERRORS);
        assert_eq!(
            blocks.iter().map(|block| block.kind.as_str()).collect::<Vec<_>>(),
            vec!["ring", "swift.conf"]
        );

        let ring = split_per_host(&blocks[0].body).unwrap();
        assert_eq!(
            ring.iter().map(|block| block.hostname.as_str()).collect::<Vec<_>>(),
            vec!["10.0.0.2", "10.0.0.1", "10.0.0.3", "10.0.0.4"]
        );
        assert_eq!(
            ring.get("10.0.0.4"),
            Some(&b"(/path/to/object.ring.gz => 54321) doesn't match on disk md5sum"[..])
        );
    }

    #[test]
    fn summary_lines_are_not_part_of_the_body() {
        let blocks = md5_blocks(fixtures::RECON_MD5);
        assert_eq!(blocks.len(), 2);
        for block in blocks {
            assert!(!String::from_utf8_lossy(&block.body).contains("hosts matched"));
        }
    }

    #[test]
    fn unrelated_output_has_no_blocks() {
        assert!(md5_blocks(b"[2019-12-30 00:15:56] Checking disk usage now\n").is_empty());
    }
}
