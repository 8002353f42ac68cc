use crate::error::CommandError;
use std::{
    path::Path,
    process::Stdio,
    time::Duration,
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Runs `executable` and returns stdout followed by stderr.
///
/// The child is killed when `timeout` elapses or `cancel` fires. A non-zero
/// exit status is an error, the output is kept on it for the log.
#[instrument(level = "debug", skip(executable, cancel), fields(executable = %executable.display()))]
pub async fn run(
    executable: &Path,
    args: &[String],
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, CommandError> {
    let mut command = Command::new(executable);
    command.args(args).stdin(Stdio::null()).kill_on_drop(true);

    let output = tokio::select! {
        _ = cancel.cancelled() => return Err(CommandError::Cancelled),
        output = tokio::time::timeout(timeout, command.output()) => output,
    };
    let output = output
        .map_err(|_| CommandError::Timeout(timeout))?
        .map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => CommandError::NotFound,
            _ => CommandError::Spawn(err),
        })?;

    let mut combined = output.stdout;
    combined.extend_from_slice(&output.stderr);
    debug!(status = %output.status, bytes = combined.len(), "command finished");

    if !output.status.success() {
        return Err(CommandError::Status {
            status: output.status,
            output: combined,
        });
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh() -> PathBuf {
        PathBuf::from("/bin/sh")
    }

    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let out = run(
            &sh(),
            &script("echo out; echo err >&2"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(out, b"out\nerr\n");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_output() {
        let err = run(
            &sh(),
            &script("echo broken; exit 3"),
            Duration::from_secs(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        match err {
            CommandError::Status { status, output } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(output, b"broken\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = run(
            &sh(),
            &script("sleep 5"),
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancelled_before_completion() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run(&sh(), &script("sleep 5"), Duration::from_secs(10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Cancelled));
    }

    #[tokio::test]
    async fn missing_executable() {
        let err = run(
            Path::new("/nonexistent/swift-recon"),
            &[],
            Duration::from_secs(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::NotFound));
    }
}
