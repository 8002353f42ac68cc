use crate::transcript::TranscriptError;
use std::{
    fmt,
    process::ExitStatus,
    time::Duration,
};

/// Why running a diagnostic executable did not produce a transcript.
#[derive(thiserror::Error, Debug)]
pub enum CommandError {
    #[error("executable not found")]
    NotFound,
    #[error("could not start executable: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{status}")]
    Status { status: ExitStatus, output: Vec<u8> },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("cancelled")]
    Cancelled,
}

#[derive(thiserror::Error, Debug)]
pub enum TaskErrorKind {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
    /// An error the tool printed on behalf of a host.
    #[error("{0}")]
    Reported(String),
}

/// A failed query, carrying the command line it belongs to and, when known,
/// the host and the output that could not be used.
#[derive(Debug)]
pub struct TaskError {
    pub cmd: &'static str,
    pub args: Vec<String>,
    pub hostname: Option<String>,
    pub output: Option<String>,
    pub kind: TaskErrorKind,
}

impl TaskError {
    pub fn new(cmd: &'static str, args: &[String], kind: impl Into<TaskErrorKind>) -> Self {
        let kind = kind.into();
        let output = match &kind {
            TaskErrorKind::Command(CommandError::Status { output, .. }) if !output.is_empty() => {
                Some(String::from_utf8_lossy(output).into_owned())
            }
            _ => None,
        };
        Self {
            cmd,
            args: args.to_vec(),
            hostname: None,
            output,
            kind,
        }
    }

    pub fn with_host(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        let output = output.into();
        self.output = (!output.is_empty()).then_some(output);
        self
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cmd, self.args.join(" "))?;
        if let Some(hostname) = &self.hostname {
            write!(f, ": {hostname}")?;
        }
        write!(f, ": {}", self.kind)?;
        if let Some(output) = &self.output {
            write!(f, " output follows:\n{output}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TaskError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args() -> Vec<String> {
        vec!["--timeout=1".to_string(), "--diskusage".to_string(), "--verbose".to_string()]
    }

    #[test]
    fn renders_command_line_and_cause() {
        let err = TaskError::new("swift-recon", &args(), TranscriptError::NoUsableOutput);
        assert_eq!(
            err.to_string(),
            "swift-recon --timeout=1 --diskusage --verbose: command did not return any usable output"
        );
    }

    #[test]
    fn renders_host_and_output() {
        let err = TaskError::new("swift-recon", &args(), TaskErrorKind::Reported("timed out".to_string()))
            .with_host("10.0.0.2")
            .with_output("<urlopen error timed out>");
        assert_eq!(
            err.to_string(),
            "swift-recon --timeout=1 --diskusage --verbose: 10.0.0.2: timed out output follows:\n<urlopen error timed out>"
        );
    }

    #[test]
    fn empty_output_is_omitted() {
        let err = TaskError::new("swift-dispersion-report", &["--dump-json".to_string()], CommandError::Cancelled)
            .with_output("");
        assert_eq!(err.to_string(), "swift-dispersion-report --dump-json: cancelled");
    }
}
