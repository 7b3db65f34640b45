use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::analyzer::{AnalyzerProcess, AnalyzerTable, RunOutcome, TimeoutGovernor};
use crate::decoder::{ProcessingResult, ResultDecoder};
use crate::error::FailureKind;
use crate::state_machine::{JobEvent, JobReport, JobState, ProcessingJob, StateMachine};

/// Read-only limits shared by every job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobLimits {
    /// Per-job deadline before the analyzer is terminated.
    pub deadline: Duration,
    /// Standard output beyond this many bytes is discarded.
    pub max_output_bytes: usize,
    /// Analyzer processes allowed to run at the same time.
    pub max_concurrent_jobs: usize,
}

impl Default for JobLimits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(60),
            max_output_bytes: 20 * 1024 * 1024,
            max_concurrent_jobs: 4,
        }
    }
}

/// A file to analyze, as handed over by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub file_path: PathBuf,
    pub mime_type: String,
}

impl JobRequest {
    pub fn new(file_path: impl Into<PathBuf>, mime_type: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// A job's terminal result together with what identifies it.
#[derive(Debug, Clone)]
pub struct CompletedJob {
    pub job_id: String,
    pub file_path: PathBuf,
    pub mime_type: String,
    pub result: ProcessingResult,
    pub report: JobReport,
}

/// A submitted job. The id is known immediately; the result arrives later.
#[derive(Debug)]
pub struct JobHandle {
    job: ProcessingJob,
    task: JoinHandle<CompletedJob>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job.id
    }

    pub fn file_path(&self) -> &std::path::Path {
        &self.job.file_path
    }

    /// Wait for the job's result. A job task that died still yields an error result.
    pub async fn wait(self) -> CompletedJob {
        let JobHandle { mut job, task } = self;
        match task.await {
            Ok(completed) => completed,
            Err(join_err) => {
                error!(job_id = %job.id, error = %join_err, "job task aborted");
                let result = ProcessingResult::error(format!("job task aborted: {join_err}"));
                job.state = JobState::Failed;
                let report = JobReport::from_job(&job, Some(FailureKind::Runtime));
                CompletedJob {
                    job_id: job.id,
                    file_path: job.file_path,
                    mime_type: job.mime_type,
                    result,
                    report,
                }
            }
        }
    }
}

/// Runs each submitted file through Command Builder → Runner → Governor → Decoder.
///
/// Cloning is cheap; clones share the resolution table and the worker permits.
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    table: Arc<AnalyzerTable>,
    limits: JobLimits,
    governor: TimeoutGovernor,
    decoder: ResultDecoder,
    permits: Arc<Semaphore>,
}

impl JobOrchestrator {
    pub fn new(table: AnalyzerTable, limits: JobLimits) -> Self {
        Self {
            table: Arc::new(table),
            limits,
            governor: TimeoutGovernor::new(limits.deadline),
            decoder: ResultDecoder::new(limits.deadline),
            permits: Arc::new(Semaphore::new(
                limits.max_concurrent_jobs.clamp(1, Semaphore::MAX_PERMITS),
            )),
        }
    }

    pub fn table(&self) -> &AnalyzerTable {
        &self.table
    }

    pub fn limits(&self) -> JobLimits {
        self.limits
    }

    /// Process one file and wait for its result.
    pub async fn process(
        &self,
        file_path: impl Into<PathBuf>,
        mime_type: impl Into<String>,
    ) -> ProcessingResult {
        let job = ProcessingJob::new(file_path.into(), mime_type.into());
        self.run_job(job).await.result
    }

    /// Start a job in the background and return a handle to it.
    pub fn submit(&self, file_path: impl Into<PathBuf>, mime_type: impl Into<String>) -> JobHandle {
        let job = ProcessingJob::new(file_path.into(), mime_type.into());
        let this = self.clone();
        let task = tokio::spawn({
            let job = job.clone();
            async move { this.run_job(job).await }
        });
        JobHandle { job, task }
    }

    /// Submit every request; results are delivered in completion order.
    pub fn submit_all<I>(&self, requests: I) -> mpsc::Receiver<CompletedJob>
    where
        I: IntoIterator<Item = JobRequest>,
    {
        let handles: Vec<JobHandle> = requests
            .into_iter()
            .map(|r| self.submit(r.file_path, r.mime_type))
            .collect();
        Self::completions(handles)
    }

    /// Forward the results of `handles` to a channel as each one finishes.
    pub fn completions(handles: Vec<JobHandle>) -> mpsc::Receiver<CompletedJob> {
        let (tx, rx) = mpsc::channel(handles.len().max(1));
        for handle in handles {
            let tx = tx.clone();
            tokio::spawn(async move {
                let completed = handle.wait().await;
                if tx.send(completed).await.is_err() {
                    debug!("result receiver dropped");
                }
            });
        }
        rx
    }

    async fn run_job(&self, mut job: ProcessingJob) -> CompletedJob {
        let (kind, _) = self.table.resolve(&job.mime_type);
        job.analyzer = Some(kind);
        info!(
            job_id = %job.id,
            file = %job.file_path.display(),
            mime = %job.mime_type,
            analyzer = %kind,
            "job queued"
        );

        let _permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                let outcome = RunOutcome::runtime_failure("job queue is closed");
                return self.finish(job, outcome);
            }
        };

        let invocation = self
            .table
            .invocation(&job.mime_type, &job.file_path, self.limits.max_output_bytes);
        let outcome = match AnalyzerProcess::spawn(&invocation) {
            Ok(process) => {
                if let Err(err) = StateMachine::apply(&mut job, JobEvent::Launched) {
                    error!(job_id = %job.id, error = %err, "unexpected job state");
                }
                info!(job_id = %job.id, analyzer = %kind, pid = process.id(), "job running");
                self.governor.supervise(process).await
            }
            Err(err) => {
                warn!(job_id = %job.id, analyzer = %kind, error = %err, "analyzer failed to launch");
                RunOutcome::launch_failure(&invocation, &err)
            }
        };

        self.finish(job, outcome)
    }

    fn finish(&self, mut job: ProcessingJob, outcome: RunOutcome) -> CompletedJob {
        let (result, failure) = self.decoder.decode_classified(outcome);
        if let Err(err) = StateMachine::apply(&mut job, JobEvent::Finished(result.status())) {
            error!(job_id = %job.id, error = %err, "unexpected job state");
        }

        let report = JobReport::from_job(&job, failure);
        match failure {
            None => info!(job_id = %job.id, duration_ms = report.duration_ms, "job succeeded"),
            Some(kind) => info!(
                job_id = %job.id,
                failure = %kind,
                error = result.message().unwrap_or_default(),
                duration_ms = report.duration_ms,
                "job failed"
            ),
        }

        CompletedJob {
            job_id: job.id,
            file_path: job.file_path,
            mime_type: job.mime_type,
            result,
            report,
        }
    }
}
