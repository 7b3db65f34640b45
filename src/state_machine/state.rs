use std::fmt;

use serde::{Deserialize, Serialize};

use super::job::ProcessingJob;
use crate::decoder::ResultStatus;
use crate::error::ExtratorError;

/// Lifecycle of a processing job.
///
/// QUEUED → RUNNING → SUCCEEDED | FAILED, with QUEUED → FAILED when the
/// analyzer never launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Succeeded => write!(f, "SUCCEEDED"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

/// What happened to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    /// The analyzer process was started.
    Launched,
    /// A terminal result was produced.
    Finished(ResultStatus),
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobEvent::Launched => write!(f, "LAUNCHED"),
            JobEvent::Finished(status) => write!(f, "FINISHED({status})"),
        }
    }
}

/// Transition rules for `ProcessingJob`. Only the orchestrator drives them.
pub struct StateMachine;

impl StateMachine {
    /// Compute the state reached from `state` on `event`.
    ///
    /// A successful result is only accepted from `Running`; an error result is
    /// accepted from `Queued` too (launch failure). Terminal states accept nothing.
    pub fn next(state: JobState, event: JobEvent) -> Result<JobState, ExtratorError> {
        if state.is_terminal() {
            return Err(ExtratorError::InvalidTransition {
                from: state,
                event: event.to_string(),
            });
        }
        match (state, event) {
            (JobState::Queued, JobEvent::Launched) => Ok(JobState::Running),
            (JobState::Queued, JobEvent::Finished(ResultStatus::Error)) => Ok(JobState::Failed),
            (JobState::Running, JobEvent::Finished(ResultStatus::Success)) => Ok(JobState::Succeeded),
            (JobState::Running, JobEvent::Finished(ResultStatus::Error)) => Ok(JobState::Failed),
            (from, event) => Err(ExtratorError::InvalidTransition {
                from,
                event: event.to_string(),
            }),
        }
    }

    /// Apply `event` to the job, recording the state it leaves.
    pub fn apply(job: &mut ProcessingJob, event: JobEvent) -> Result<JobState, ExtratorError> {
        let next = Self::next(job.state, event)?;
        job.state_history.push(job.state);
        job.state = next;
        job.updated_at = chrono::Utc::now();
        Ok(next)
    }
}
