use thiserror::Error;

use crate::state_machine::JobState;

#[derive(Debug, Error)]
pub enum ExtratorError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid job transition: {event} while {from}")]
    InvalidTransition { from: JobState, event: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Classifies why a job ended with an error result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The analyzer could not be started (missing, not executable).
    Launch,
    /// The analyzer ran but exited with a failure status.
    Runtime,
    /// The deadline elapsed and the analyzer was terminated.
    Timeout,
    /// Standard output was not a valid result document.
    Decode,
    /// The analyzer itself answered with `status: "error"`.
    Reported,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Launch => write!(f, "Launch"),
            FailureKind::Runtime => write!(f, "Runtime"),
            FailureKind::Timeout => write!(f, "Timeout"),
            FailureKind::Decode => write!(f, "Decode"),
            FailureKind::Reported => write!(f, "Reported"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ExtratorError::Config("timeout_secs must be greater than zero".into());
        assert_eq!(
            err.to_string(),
            "Config error: timeout_secs must be greater than zero"
        );
    }

    #[test]
    fn invalid_transition_display() {
        let err = ExtratorError::InvalidTransition {
            from: JobState::Succeeded,
            event: "LAUNCHED".into(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid job transition: LAUNCHED while SUCCEEDED"
        );
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::Timeout).unwrap();
        assert_eq!(json, r#""timeout""#);
        assert_eq!(FailureKind::Decode.to_string(), "Decode");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExtratorError>();
    }
}
