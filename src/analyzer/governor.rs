//! Deadline enforcement for analyzer processes.
//!
//! The collector task owns the child; the governor only holds a [`KillSwitch`].
//! When the deadline wins the race the switch fires and the governor stops
//! waiting right away, while the collector kills and reaps the process in the
//! background.

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::command::AnalyzerInvocation;
use super::runner::{AnalyzerProcess, RunOutcome};

/// Non-owning termination handle for one running analyzer.
///
/// Consumed on use, so a process is signaled at most once.
#[derive(Debug)]
pub struct KillSwitch {
    tx: oneshot::Sender<()>,
    pid: Option<u32>,
}

impl KillSwitch {
    pub fn new(pid: Option<u32>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx, pid }, rx)
    }

    /// Ask the collector to terminate its process. Returns `false` when the
    /// collector had already finished.
    pub fn trigger(self) -> bool {
        let delivered = self.tx.send(()).is_ok();
        if !delivered {
            debug!(pid = self.pid, "analyzer finished before termination was requested");
        }
        delivered
    }
}

/// Races each analyzer against a fixed, per-job deadline.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGovernor {
    deadline: Duration,
}

impl TimeoutGovernor {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Launch and supervise an invocation.
    pub async fn run(&self, invocation: &AnalyzerInvocation) -> RunOutcome {
        match AnalyzerProcess::spawn(invocation) {
            Ok(process) => self.supervise(process).await,
            Err(err) => RunOutcome::launch_failure(invocation, &err),
        }
    }

    /// Wait for an already launched analyzer, terminating it at the deadline.
    pub async fn supervise(&self, process: AnalyzerProcess) -> RunOutcome {
        let pid = process.id();
        let (switch, signal) = KillSwitch::new(pid);
        let mut collector = tokio::spawn(process.collect(signal));

        match tokio::time::timeout(self.deadline, &mut collector).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) => {
                RunOutcome::runtime_failure(format!("analyzer supervisor failed: {join_err}"))
            }
            Err(_) => {
                warn!(
                    pid,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "analyzer exceeded deadline, terminating"
                );
                switch.trigger();
                RunOutcome::TimedOut
            }
        }
    }
}

impl Default for TimeoutGovernor {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
