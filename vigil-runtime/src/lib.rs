//! # Vigil Runtime
//!
//! The test-suite execution pipeline: deciding whether a suite should run,
//! invoking the execution service, turning results into alerts and applying
//! user feedback to suite thresholds.
//!
//! Every public operation returns `Result<T, OperationFailed>`. Internal
//! errors are logged in full at the boundary and never shown to callers.

pub mod alerting;
pub mod collaborators;
pub mod config;
pub mod context;
pub mod feedback;
pub mod metrics;
pub mod staleness;
pub mod suites;
pub mod trigger;

// Re-export commonly used types
pub use alerting::{AlertOutcome, ResultHandler};
pub use collaborators::{
    AlertMessage, AlertSender, AnomalyAlert, ChartGenerator, ChartImage, CollaboratorError,
    CollaboratorResult, DeliveryReceipt, ExecuteRequest, ExecutionService, ScheduleRegistry,
    ScheduleUpdate, SchemaChangeAlert,
};
pub use config::PipelineConfig;
pub use context::{CallContext, Stores};
pub use feedback::{FeedbackOutcome, FeedbackProcessor, FeedbackRequest};
pub use staleness::{StalenessOracle, StalenessQuery};
pub use suites::SuiteService;
pub use trigger::{ExecutionTrigger, SkipReason, TriggerOutcome, TriggerRequest};

use tracing::error;
use vigil_core::{RoutingError, SuiteError};

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("Invalid suite: {0}")]
    Suite(#[from] SuiteError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Test suite not found: {0}")]
    SuiteNotFound(String),

    #[error("Staleness probe error: {0}")]
    Probe(String),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Alert was not delivered: {0}")]
    DeliveryFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vigil_storage::Error),

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    #[error("Cancelled during {0}")]
    Cancelled(&'static str),
}

impl Error {
    /// Short label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Routing(_) => "routing",
            Error::Suite(_) | Error::Validation(_) => "validation",
            Error::SuiteNotFound(_) => "not_found",
            Error::Probe(_) => "probe",
            Error::ContractViolation(_) => "contract_violation",
            Error::Unsupported(_) => "unsupported",
            Error::DeliveryFailed(_) => "delivery",
            Error::Storage(_) => "storage",
            Error::Collaborator(_) => "collaborator",
            Error::DeadlineExceeded(_) => "deadline",
            Error::Cancelled(_) => "cancelled",
        }
    }
}

/// Opaque failure returned by every public pipeline operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation failed")]
pub struct OperationFailed;

/// Log `err` with full detail and replace it with [`OperationFailed`]
pub(crate) fn conceal(operation: &'static str, err: Error) -> OperationFailed {
    error!(
        operation,
        error_kind = err.kind(),
        error = %err,
        "Pipeline operation failed"
    );
    OperationFailed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_failed_is_opaque() {
        let err = Error::Probe("expected exactly one row, got 3".to_string());
        assert_eq!(err.kind(), "probe");
        let failed = conceal("trigger", err);
        assert_eq!(failed.to_string(), "operation failed");
    }

    #[test]
    fn test_error_conversions() {
        let err: Error = RoutingError::MissingCallerOrganization.into();
        assert_eq!(err.kind(), "routing");

        let err: Error = vigil_storage::Error::NotFound("x".to_string()).into();
        assert_eq!(err.kind(), "storage");

        let err: Error = SuiteError::MissingField("cron").into();
        assert_eq!(err.kind(), "validation");
    }
}
