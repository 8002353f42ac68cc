use lazy_static::lazy_static;
use regex::bytes::Regex;

lazy_static! {
    /// `ERROR: 10.0.0.1:6000/sdb-01: [Errno 111] ECONNREFUSED`
    static ref ERROR_LINE: Regex =
        Regex::new(r"(?m-u)^[ \t]*ERROR:[ \t]*([^\s:/]+)\S*[ \t]*(.*)$").expect("dispersion error pattern");
}

const UNMOUNTED_SENTINEL: &str = "is unmounted";

/// An `ERROR:` line printed by `swift-dispersion-report` ahead of its JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispersionError {
    pub host: String,
    pub message: String,
    /// Unmounted devices are owned by the unmounted drives task and do not
    /// count as report errors.
    pub unmounted: bool,
}

/// Removes every `ERROR:` line from the report and returns them next to what is left.
pub fn strip_dispersion_errors(report: &[u8]) -> (Vec<u8>, Vec<DispersionError>) {
    let mut errors = Vec::new();
    let stripped = ERROR_LINE.replace_all(report, |captures: &regex::bytes::Captures<'_>| {
        let message = String::from_utf8_lossy(&captures[2]).trim_end().to_string();
        errors.push(DispersionError {
            host: String::from_utf8_lossy(&captures[1]).into_owned(),
            unmounted: String::from_utf8_lossy(&captures[0]).contains(UNMOUNTED_SENTINEL),
            message,
        });
        Vec::new()
    });
    (stripped.into_owned(), errors)
}
