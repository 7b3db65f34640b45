//! Orquestrador de análise de arquivos.
//!
//! Cada arquivo submetido vira um job independente: o analisador externo é
//! escolhido pelo tipo MIME, executado como subprocesso sob um prazo fixo, e a
//! saída é decodificada num [`ProcessingResult`]. Erros são dados, nunca pânico.

pub mod analyzer;
pub mod bridge;
pub mod config;
pub mod decoder;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod state_machine;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod test_support;

pub use bridge::Bridge;
pub use config::ExtratorConfig;
pub use decoder::{ProcessingResult, ResultStatus};
pub use error::{ExtratorError, FailureKind};
pub use orchestrator::{CompletedJob, JobHandle, JobLimits, JobOrchestrator, JobRequest};
