//! Subprocess runner for analyzer programs.
//!
//! Each call spawns one OS process with the file path as its argument,
//! captures standard output up to a byte ceiling and classifies the exit.

use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::command::AnalyzerInvocation;
use crate::error::FailureKind;

/// Stderr is only kept for error messages, so it gets a small ceiling.
const STDERR_CAPTURE_BYTES: usize = 64 * 1024;

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Raw outcome of a single analyzer invocation, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exited successfully; carries the captured standard output.
    Completed(String),
    /// Failed to launch (`Launch`) or exited with an error status (`Runtime`).
    ExecError { kind: FailureKind, message: String },
    /// The deadline elapsed and the process was signaled to terminate.
    TimedOut,
}

impl RunOutcome {
    pub fn launch_failure(invocation: &AnalyzerInvocation, err: &io::Error) -> Self {
        RunOutcome::ExecError {
            kind: FailureKind::Launch,
            message: format!(
                "failed to launch analyzer '{}': {err}",
                invocation.program.display()
            ),
        }
    }

    pub fn runtime_failure(message: impl Into<String>) -> Self {
        RunOutcome::ExecError {
            kind: FailureKind::Runtime,
            message: message.into(),
        }
    }
}

/// A running analyzer. Owns the child process until it is collected.
#[derive(Debug)]
pub struct AnalyzerProcess {
    child: Child,
    pid: Option<u32>,
    max_output_bytes: usize,
}

impl AnalyzerProcess {
    /// Launch the analyzer described by `invocation`.
    pub fn spawn(invocation: &AnalyzerInvocation) -> io::Result<Self> {
        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let pid = child.id();
        debug!(pid, command = %invocation.command_line(), "analyzer launched");

        Ok(Self {
            child,
            pid,
            max_output_bytes: invocation.max_output_bytes,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Capture output and wait for exit, or terminate when `terminate` fires.
    ///
    /// A dropped sender does not count as a termination request.
    pub async fn collect(self, terminate: oneshot::Receiver<()>) -> RunOutcome {
        let AnalyzerProcess {
            mut child,
            pid,
            max_output_bytes,
        } = self;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let finished = async {
            tokio::join!(
                read_bounded(stdout, max_output_bytes),
                read_bounded(stderr, STDERR_CAPTURE_BYTES),
                child.wait(),
            )
        };

        tokio::select! {
            (out, err, status) = finished => classify(pid, out, err, status),
            Ok(()) = terminate => {
                terminate_and_reap(&mut child, pid).await;
                RunOutcome::TimedOut
            }
        }
    }
}

/// Run an invocation to completion with no deadline.
pub async fn run(invocation: &AnalyzerInvocation) -> RunOutcome {
    match AnalyzerProcess::spawn(invocation) {
        Ok(process) => {
            let (_keep_open, never) = oneshot::channel();
            process.collect(never).await
        }
        Err(err) => RunOutcome::launch_failure(invocation, &err),
    }
}

/// Bytes read from one pipe, cut at the capture ceiling.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

impl Captured {
    fn into_text(self) -> String {
        match String::from_utf8(self.bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

// Keeps draining past the limit so the child never blocks on a full pipe.
async fn read_bounded<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize) -> Captured {
    let Some(mut reader) = reader else {
        return Captured::default();
    };
    let mut captured = Captured::default();
    let mut chunk = [0u8; READ_CHUNK_BYTES];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(captured.bytes.len());
                if n > room {
                    captured.truncated = true;
                }
                captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(err) => {
                warn!(error = %err, "failed reading analyzer output");
                break;
            }
        }
    }
    captured
}

fn classify(
    pid: Option<u32>,
    stdout: Captured,
    stderr: Captured,
    status: io::Result<ExitStatus>,
) -> RunOutcome {
    let status = match status {
        Ok(status) => status,
        Err(err) => return RunOutcome::runtime_failure(format!("failed to wait for analyzer: {err}")),
    };
    if stdout.truncated {
        warn!(pid, captured = stdout.bytes.len(), "analyzer output truncated at capture limit");
    }
    debug!(pid, %status, "analyzer exited");

    if status.success() {
        return RunOutcome::Completed(stdout.into_text());
    }

    let detail = stderr.into_text();
    let detail = detail.trim();
    let exit = describe_exit(status);
    if detail.is_empty() {
        RunOutcome::runtime_failure(format!("analyzer exited with {exit}"))
    } else {
        RunOutcome::runtime_failure(format!("analyzer exited with {exit}: {detail}"))
    }
}

fn describe_exit(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

// Termination is best-effort: a failed kill is logged and the caller moves on.
async fn terminate_and_reap(child: &mut Child, pid: Option<u32>) {
    if let Err(err) = child.start_kill() {
        error!(pid, error = %err, "failed to terminate analyzer");
        return;
    }
    debug!(pid, "termination signal sent");
    match child.wait().await {
        Ok(status) => debug!(pid, %status, "terminated analyzer reaped"),
        Err(err) => warn!(pid, error = %err, "failed to reap terminated analyzer"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::{INVOICE_JSON, sh_invocation, write_script};
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn captures_stdout_of_successful_analyzer() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "ok.sh", &format!("printf '%s' '{INVOICE_JSON}'\n"));

        let outcome = run(&sh_invocation(&script, "/tmp/invoice.pdf", 1024)).await;
        assert_eq!(outcome, RunOutcome::Completed(INVOICE_JSON.to_string()));
    }

    #[tokio::test]
    async fn analyzer_receives_file_path_argument() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "echo.sh", "printf '%s' \"$1\"\n");

        let outcome = run(&sh_invocation(&script, "/tmp/with space's.pdf", 1024)).await;
        assert_eq!(outcome, RunOutcome::Completed("/tmp/with space's.pdf".into()));
    }

    #[tokio::test]
    async fn output_beyond_limit_is_truncated() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            &dir,
            "big.sh",
            "i=0\nwhile [ $i -lt 2000 ]; do printf 'abcdefghij'; i=$((i+1)); done\n",
        );

        let outcome = run(&sh_invocation(&script, "/tmp/f.pdf", 100)).await;
        match outcome {
            RunOutcome::Completed(text) => {
                assert_eq!(text.len(), 100);
                assert!(text.starts_with("abcdefghij"));
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_zero_exit_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "fail.sh", "echo 'arquivo corrompido' >&2\nexit 3\n");

        let outcome = run(&sh_invocation(&script, "/tmp/f.pdf", 1024)).await;
        assert_eq!(
            outcome,
            RunOutcome::ExecError {
                kind: FailureKind::Runtime,
                message: "analyzer exited with exit code 3: arquivo corrompido".into(),
            }
        );
    }

    #[tokio::test]
    async fn non_zero_exit_without_stderr() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "fail.sh", "exit 1\n");

        let outcome = run(&sh_invocation(&script, "/tmp/f.pdf", 1024)).await;
        assert_eq!(outcome, RunOutcome::runtime_failure("analyzer exited with exit code 1"));
    }

    #[tokio::test]
    async fn missing_program_is_launch_failure() {
        let mut inv = sh_invocation(&PathBuf::from("/nonexistent/x.sh"), "/tmp/f.pdf", 1024);
        inv.program = PathBuf::from("/definitely/not/a/program");

        match run(&inv).await {
            RunOutcome::ExecError { kind, message } => {
                assert_eq!(kind, FailureKind::Launch);
                assert!(message.starts_with("failed to launch analyzer '/definitely/not/a/program'"));
            }
            other => panic!("expected launch failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn termination_signal_stops_collection() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "hang.sh", "exec sleep 30\n");

        let process = AnalyzerProcess::spawn(&sh_invocation(&script, "/tmp/f.pdf", 1024)).unwrap();
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(process.collect(rx));
        tx.send(()).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("collector should stop after termination")
            .unwrap();
        assert_eq!(outcome, RunOutcome::TimedOut);
    }

    #[tokio::test]
    async fn invalid_utf8_is_decoded_lossily() {
        let dir = TempDir::new().unwrap();
        let script = write_script(&dir, "bin.sh", "printf 'ok\\377'\n");

        let outcome = run(&sh_invocation(&script, "/tmp/f.pdf", 1024)).await;
        assert_eq!(outcome, RunOutcome::Completed("ok\u{FFFD}".into()));
    }
}
