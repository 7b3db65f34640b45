use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::JobState;
use crate::analyzer::AnalyzerKind;
use crate::error::FailureKind;

/// One submitted file, tracked from submission to its terminal result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: String,
    pub file_path: PathBuf,
    pub mime_type: String,
    pub analyzer: Option<AnalyzerKind>,
    pub state: JobState,
    pub state_history: Vec<JobState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingJob {
    pub fn new(file_path: PathBuf, mime_type: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            file_path,
            mime_type,
            analyzer: None,
            state: JobState::Queued,
            state_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Base name of the source file, for display.
    pub fn file_name(&self) -> String {
        display_name(&self.file_path)
    }
}

/// Base name of `path`, or the whole path when it has none.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Summary delivered with a job's result. The orchestrator keeps no copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub job_id: String,
    pub file_path: PathBuf,
    pub mime_type: String,
    pub analyzer: Option<AnalyzerKind>,
    pub state: JobState,
    pub state_transitions: Vec<JobState>,
    pub failure: Option<FailureKind>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl JobReport {
    /// Build a report from a job in its terminal state.
    pub fn from_job(job: &ProcessingJob, failure: Option<FailureKind>) -> Self {
        let now = Utc::now();
        let duration = now - job.created_at;
        let mut transitions = job.state_history.clone();
        transitions.push(job.state);

        Self {
            job_id: job.id.clone(),
            file_path: job.file_path.clone(),
            mime_type: job.mime_type.clone(),
            analyzer: job.analyzer,
            state: job.state,
            state_transitions: transitions,
            failure,
            started_at: job.created_at,
            completed_at: now,
            duration_ms: duration.num_milliseconds(),
        }
    }
}
