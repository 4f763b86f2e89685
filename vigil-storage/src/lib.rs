//! # Vigil Storage
//!
//! Persistence for Vigil: the suite repository and execution history backed
//! by PostgreSQL with row-level security per organization, plus the
//! read-only warehouse probe used for staleness checks.

pub mod migrations;
pub mod models;
pub mod postgres;
pub mod repository;
pub mod warehouse;

// Re-export commonly used types
pub use models::{TestHistoryModel, TestSuiteModel};
pub use postgres::{PoolConfig, PostgresStorage};
pub use repository::{
    ExecutionHistory, ProbeRow, StalenessProbe, SuiteFilter, SuiteRepository, WarehouseProbe,
};
pub use vigil_core::OrganizationId;
pub use warehouse::{SqlxWarehouseProbe, WarehouseConfig};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
}
