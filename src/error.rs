//! Error types for start runs
//!
//! Only collaborator failures are errors: the calendar file, the start
//! request, and the status fetch. A non-workday date and a poll that runs
//! out its budget are ordinary `StartOutcome` variants, not errors.
//! Collaborator failures are logged and propagated unmodified; retry
//! policy belongs to whatever invoked the run.

use std::path::PathBuf;
use thiserror::Error;

/// Error types for a start run
#[derive(Debug, Error)]
pub enum StartError {
    // Retryable errors
    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    // Non-retryable errors
    #[error("API credentials rejected")]
    AuthRejected,

    #[error("Start response contained no operation id")]
    MissingOperationId,

    #[error("Calendar file {path}: {message}")]
    Calendar { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl StartError {
    /// Returns true if a later invocation could plausibly succeed without
    /// operator intervention. The run itself never retries; this feeds the
    /// execution record so the invoking scheduler can decide.
    pub fn is_retryable(&self) -> bool {
        match self {
            StartError::Http(_) => true,
            StartError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<std::io::Error> for StartError {
    fn from(err: std::io::Error) -> Self {
        StartError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        let err = StartError::Api {
            status: 503,
            message: "upstream unavailable".to_string(),
        };
        assert!(err.is_retryable());

        let err = StartError::Api {
            status: 429,
            message: "throttled".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        let err = StartError::Api {
            status: 404,
            message: "no such instance".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!StartError::AuthRejected.is_retryable());
        assert!(!StartError::MissingOperationId.is_retryable());
        assert!(!StartError::Configuration("api.baseUrl is not set".to_string()).is_retryable());
    }
}
