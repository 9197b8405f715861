//! # Poller Error Types
//!
//! Structured error handling for the poller using thiserror. Only startup
//! failures are fatal; everything raised while processing a record is logged
//! by the worker and never crosses back into the cycle loop.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PollerError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Routing table error: {path}: {message}")]
    RoutingTable { path: String, message: String },

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Database query error: {operation}: {message}")]
    DatabaseQuery { operation: String, message: String },

    #[error("Status API error for message {external_id}: {message}")]
    StatusOracle { external_id: i64, message: String },

    #[error("Callback error: {url}: {message}")]
    Callback { url: String, message: String },

    #[error("Worker {worker_id} panicked: {message}")]
    WorkerPanicked { worker_id: usize, message: String },
}

impl PollerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn query(operation: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::DatabaseQuery {
            operation: operation.into(),
            message: err.to_string(),
        }
    }

    /// True for errors that should stop the process rather than a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::RoutingTable { .. }
                | Self::DatabaseConnection { .. }
                | Self::WorkerPanicked { .. }
        )
    }
}

impl From<config::ConfigError> for PollerError {
    fn from(err: config::ConfigError) -> Self {
        Self::configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PollerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(PollerError::configuration("bad").is_fatal());
        assert!(PollerError::WorkerPanicked {
            worker_id: 3,
            message: "boom".into()
        }
        .is_fatal());
        assert!(!PollerError::StatusOracle {
            external_id: 7,
            message: "connection refused".into()
        }
        .is_fatal());
        assert!(!PollerError::query("fetch_pending", "timeout").is_fatal());
    }

    #[test]
    fn display_includes_context() {
        let err = PollerError::Callback {
            url: "http://cb/2".into(),
            message: "reset".into(),
        };
        assert_eq!(err.to_string(), "Callback error: http://cb/2: reset");
    }
}
