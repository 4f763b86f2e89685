//! Storage interfaces consumed by the pipeline
//!
//! The pipeline never owns a connection pool. Callers hand it borrowed
//! implementations of these traits for the duration of one operation.

use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vigil_core::{OrganizationId, SuiteCategory, SuiteId, SuiteKind, TestSuite};

/// Criteria for [`SuiteRepository::find_by`]; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteFilter {
    pub kind: Option<SuiteKind>,
    pub activated: Option<bool>,
    pub ids: Option<Vec<SuiteId>>,
    /// Matches suites reporting against any of these resources
    pub target_resource_ids: Option<Vec<String>>,
    /// `Some(false)` hides soft-deleted suites, `Some(true)` shows only them
    pub deleted: Option<bool>,
}

impl SuiteFilter {
    pub fn kind(mut self, kind: SuiteKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn activated(mut self, activated: bool) -> Self {
        self.activated = Some(activated);
        self
    }

    pub fn ids(mut self, ids: impl IntoIterator<Item = SuiteId>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    pub fn target_resource_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.target_resource_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }

    /// Returns true if `suite` satisfies every set criterion
    pub fn matches(&self, suite: &TestSuite) -> bool {
        if self.kind.is_some_and(|k| k != suite.kind()) {
            return false;
        }
        if self.activated.is_some_and(|a| a != suite.activated()) {
            return false;
        }
        if self.deleted.is_some_and(|d| d != suite.is_deleted()) {
            return false;
        }
        if let Some(ids) = &self.ids {
            if !ids.contains(suite.id()) {
                return false;
            }
        }
        if let Some(resources) = &self.target_resource_ids {
            let own = suite.target_resource_ids();
            if !own.iter().any(|r| resources.contains(r)) {
                return false;
            }
        }
        true
    }
}

/// Persistent store of test suites, scoped per organization
#[async_trait]
pub trait SuiteRepository: Send + Sync {
    /// Fetch one suite by id, including soft-deleted ones
    async fn find_one(&self, id: &SuiteId, org: &OrganizationId) -> Result<Option<TestSuite>>;

    async fn find_by(&self, filter: &SuiteFilter, org: &OrganizationId) -> Result<Vec<TestSuite>>;

    /// Persist new suites in a single round trip
    async fn insert_many(&self, suites: &[TestSuite], org: &OrganizationId) -> Result<Vec<SuiteId>>;

    /// Overwrite existing suites in a single round trip
    async fn replace_many(&self, suites: &[TestSuite], org: &OrganizationId) -> Result<()>;
}

/// Record of past executions, written by the execution service
#[async_trait]
pub trait ExecutionHistory: Send + Sync {
    /// Time of the most recent execution of `suite_id` in `category`
    async fn last_execution_at(
        &self,
        suite_id: &SuiteId,
        category: SuiteCategory,
        org: &OrganizationId,
    ) -> Result<Option<DateTime<Utc>>>;

    /// Store the user's verdict on the alert with `alert_id`
    async fn record_feedback(
        &self,
        alert_id: &str,
        is_anomaly: bool,
        org: &OrganizationId,
    ) -> Result<()>;
}

/// A staleness probe row; the oracle validates its shape
pub type ProbeRow = serde_json::Map<String, serde_json::Value>;

/// "Was this materialization altered within the last N minutes?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessProbe {
    pub database_name: String,
    pub schema_name: String,
    pub materialization_name: String,
    pub lookback_minutes: i64,
}

/// Read-only access to the warehouse's metadata
#[async_trait]
pub trait WarehouseProbe: Send + Sync {
    /// Run the staleness query; each row should carry a `was_altered` column
    async fn query(&self, probe: &StalenessProbe) -> Result<Vec<ProbeRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{
        ExecutionType, MaterializationType, QualitativeSpec, QualitativeTestType, SuiteProps,
        SuiteSpec, Target,
    };

    fn suite(id: &str, activated: bool) -> TestSuite {
        TestSuite::new(SuiteProps {
            id: id.to_string(),
            activated,
            cron: "0 * * * *".to_string(),
            execution_type: Some(ExecutionType::Frequency),
            deleted_at: None,
            spec: SuiteSpec::Qualitative(QualitativeSpec {
                test_type: QualitativeTestType::MaterializationSchemaChange,
                target: Target::materialization("DB", "SCH", "ORDERS", MaterializationType::Table),
            }),
        })
        .unwrap()
    }

    #[test]
    fn test_default_filter_matches_everything() {
        assert!(SuiteFilter::default().matches(&suite("a", true)));
        assert!(SuiteFilter::default().matches(&suite("b", false)));
    }

    #[test]
    fn test_filter_criteria_combine() {
        let filter = SuiteFilter::default()
            .kind(SuiteKind::Qualitative)
            .activated(true)
            .ids([SuiteId::new("a")]);
        assert!(filter.matches(&suite("a", true)));
        assert!(!filter.matches(&suite("a", false)));
        assert!(!filter.matches(&suite("b", true)));
        assert!(!SuiteFilter::default()
            .kind(SuiteKind::Custom)
            .matches(&suite("a", true)));
    }

    #[test]
    fn test_filter_by_resource_and_deletion() {
        let s = suite("a", true);
        assert!(SuiteFilter::default()
            .target_resource_ids(["DB.SCH.ORDERS".to_string()])
            .matches(&s));
        assert!(!SuiteFilter::default()
            .target_resource_ids(["DB.SCH.OTHER".to_string()])
            .matches(&s));
        assert!(SuiteFilter::default().deleted(false).matches(&s));
        assert!(!SuiteFilter::default().deleted(true).matches(&s));
    }
}
