use super::TranscriptError;
use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    /// `-> http://10.0.0.1:6000/recon/diskusage: <payload>`, `!!` marks lines flagged by the auditor.
    static ref HOST_LINE: Regex =
        Regex::new(r"(?m-u)^(?:->|!!) https?://([a-zA-Z0-9-.]+)\S*\s(.*)$").expect("host line pattern");
}

/// The answer of a single storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBlock {
    pub hostname: String,
    pub payload: Vec<u8>,
}

impl HostBlock {
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Host payloads in the order the hosts first appeared. A host that answered
/// more than once keeps its last payload.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostBlocks(Vec<HostBlock>);

impl HostBlocks {
    fn insert(&mut self, hostname: String, payload: Vec<u8>) {
        match self.0.iter_mut().find(|block| block.hostname == hostname) {
            Some(block) => block.payload = payload,
            None => self.0.push(HostBlock { hostname, payload }),
        }
    }

    pub fn get(&self, hostname: &str) -> Option<&[u8]> {
        self.0
            .iter()
            .find(|block| block.hostname == hostname)
            .map(|block| block.payload.as_slice())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostBlock> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a HostBlocks {
    type Item = &'a HostBlock;
    type IntoIter = std::slice::Iter<'a, HostBlock>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Groups the host lines of a transcript, or of a block cut out of one, by
/// the host that answered.
pub fn split_per_host(transcript: &[u8]) -> Result<HostBlocks, TranscriptError> {
    let mut hosts = HostBlocks::default();
    for captures in HOST_LINE.captures_iter(transcript) {
        let hostname = String::from_utf8_lossy(&captures[1]).into_owned();
        let payload = captures[2].strip_suffix(b"\r").unwrap_or(&captures[2]).to_vec();
        trace!(host = %hostname, payload = %String::from_utf8_lossy(&payload), "host output");
        hosts.insert(hostname, payload);
    }

    if hosts.is_empty() {
        return Err(TranscriptError::NoUsableOutput);
    }
    Ok(hosts)
}
