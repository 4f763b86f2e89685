//! # Vigil Core
//!
//! Domain model for Vigil: validated test suite entities, organization
//! routing rules and the execution results reported by the test-execution
//! service.

pub mod result;
pub mod routing;
pub mod suite;

// Re-export commonly used types
pub use result::{
    AlertData, Anomaly, AnomalyReport, ExecutionResult, SchemaAlertData, SchemaChangeResult,
    SchemaDeviation, SchemaTestData, TestData,
};
pub use routing::{resolve_organization, AuthContext, OrganizationId, RoutingError};
pub use suite::{
    CustomSpec, CustomThresholds, ExecutionType, MaterializationType, QualitativeSpec,
    QualitativeTestType, QuantitativeSpec, QuantitativeTestType, SuiteCategory, SuiteError,
    SuiteId, SuiteKind, SuitePatch, SuiteProps, SuiteSpec, Target, TestSuite, TestType,
    ThresholdMode, ThresholdSide, Thresholds,
};

/// Result type for Vigil core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Vigil core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Suite error: {0}")]
    Suite(#[from] SuiteError),

    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}
