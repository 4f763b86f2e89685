//! # Vigil Cloud
//!
//! HTTP clients for the services the Vigil pipeline calls out to: test
//! execution, chart rendering, alert delivery and scheduling. Each client
//! implements the matching collaborator trait from `vigil-runtime`.

pub mod clients;
pub mod config;

pub use clients::{HttpAlertSender, HttpChartGenerator, HttpExecutionService, HttpScheduleRegistry};
pub use config::ServiceConfig;

use vigil_runtime::CollaboratorError;

/// Result type for client construction and configuration
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the cloud adapters
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<Error> for CollaboratorError {
    fn from(err: Error) -> Self {
        match err {
            Error::Configuration(msg) => CollaboratorError::Configuration(msg),
            Error::Http(e) => CollaboratorError::Transport(e.to_string()),
            Error::Internal(msg) => CollaboratorError::Transport(msg),
        }
    }
}
