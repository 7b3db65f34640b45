pub mod command;
pub mod governor;
pub mod runner;

pub use command::{AnalyzerInvocation, AnalyzerKind, AnalyzerTable};
pub use governor::{KillSwitch, TimeoutGovernor};
pub use runner::{AnalyzerProcess, RunOutcome};
