mod job;
mod state;

pub use job::{JobReport, ProcessingJob, display_name};
pub use state::{JobEvent, JobState, StateMachine};
