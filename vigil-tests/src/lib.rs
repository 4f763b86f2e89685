//! Shared test utilities for Vigil crates
//!
//! This crate provides:
//! - **Fixtures**: ready-made suites, organizations and probe rows
//! - **Builders**: execution results and caller identities
//! - **Mocks**: in-memory stores and recording collaborators
//! - **Assertions**: checks over recorded side effects
//!
//! # Example
//!
//! ```ignore
//! use vigil_tests::{fixtures, mocks};
//!
//! #[tokio::test]
//! async fn test_trigger() {
//!     let stores = mocks::TestStores::new(mocks::ScriptedWarehouse::altered(true));
//!     stores.suites.seed(&fixtures::org::primary(), fixtures::suite::quantitative(
//!         "S1",
//!         ExecutionType::Frequency,
//!     ));
//!     // trigger against stores.stores() ...
//! }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used items
pub use builders::{AuthContextBuilder, ExecutionResultBuilder};
pub use mocks::{
    InMemoryHistory, InMemorySuiteRepository, RecordingAlertSender, RecordingExecutionService,
    RecordingScheduleRegistry, ScriptedWarehouse, StaticChartGenerator, TestStores,
};
