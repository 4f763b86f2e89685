//! Downstream services the pipeline calls out to
//!
//! The runtime only depends on these traits. Concrete HTTP clients live in
//! `vigil-cloud`; tests substitute recording fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use vigil_core::{
    ExecutionType, OrganizationId, SchemaDeviation, SuiteId, SuiteKind, TestSuite, TestType,
    ThresholdSide,
};

/// Result type for collaborator calls
pub type CollaboratorResult<T> = std::result::Result<T, CollaboratorError>;

/// Errors that can occur while calling a downstream service
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Request to run one suite now
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub test_suite_id: SuiteId,
    pub test_type: TestType,
    pub target_org_id: OrganizationId,
}

/// Runs test suites against the warehouse
#[async_trait]
pub trait ExecutionService: Send + Sync {
    /// Start one execution; the service dedupes by its own execution id
    async fn execute(&self, request: &ExecuteRequest, jwt: &str) -> CollaboratorResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartImage {
    pub url: String,
}

/// Renders the history chart attached to anomaly alerts
#[async_trait]
pub trait ChartGenerator: Send + Sync {
    async fn generate_chart(
        &self,
        suite_id: &SuiteId,
        org: &OrganizationId,
    ) -> CollaboratorResult<ChartImage>;
}

/// Alert for a value outside its expected range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAlert {
    pub alert_id: String,
    pub test_type: TestType,
    pub name: String,
    pub expected_upper_bound: String,
    pub expected_lower_bound: String,
    /// Percentage, two decimals
    pub deviation: String,
    pub chart_url: String,
    pub detected_value: String,
    pub threshold_side: ThresholdSide,
    pub test_suite_id: SuiteId,
    pub message: String,
}

/// Alert for a materialization whose schema drifted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChangeAlert {
    pub alert_id: String,
    pub test_type: TestType,
    pub name: String,
    pub test_suite_id: SuiteId,
    pub target_resource_id: String,
    pub deviations: Vec<SchemaDeviation>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertMessage {
    Anomaly(AnomalyAlert),
    SchemaChange(SchemaChangeAlert),
}

impl AlertMessage {
    pub fn alert_id(&self) -> &str {
        match self {
            AlertMessage::Anomaly(alert) => &alert.alert_id,
            AlertMessage::SchemaChange(alert) => &alert.alert_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub delivered: bool,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Delivers alerts to the organization's messaging channel
#[async_trait]
pub trait AlertSender: Send + Sync {
    async fn send_alert(
        &self,
        message: &AlertMessage,
        org: &OrganizationId,
        jwt: &str,
    ) -> CollaboratorResult<DeliveryReceipt>;
}

/// Schedule state the scheduler keeps per suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    pub cron: String,
    pub execution_type: ExecutionType,
    pub test_suite_id: SuiteId,
    pub to_be_activated: bool,
}

impl From<&TestSuite> for ScheduleUpdate {
    fn from(suite: &TestSuite) -> Self {
        Self {
            cron: suite.cron().to_string(),
            execution_type: suite.execution_type(),
            test_suite_id: suite.id().clone(),
            to_be_activated: suite.activated() && !suite.is_deleted(),
        }
    }
}

/// Registers cron schedules that later fire triggers
#[async_trait]
pub trait ScheduleRegistry: Send + Sync {
    async fn create_schedules(
        &self,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        jwt: &str,
    ) -> CollaboratorResult<()>;

    async fn update_schedules(
        &self,
        org: &OrganizationId,
        kind: SuiteKind,
        schedules: &[ScheduleUpdate],
        jwt: &str,
    ) -> CollaboratorResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::QuantitativeTestType;

    #[test]
    fn test_execute_request_wire_format() {
        let request = ExecuteRequest {
            test_suite_id: SuiteId::new("S1"),
            test_type: TestType::Quantitative(QuantitativeTestType::MaterializationRowCount),
            target_org_id: OrganizationId::new("org-a"),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "testSuiteId": "S1",
                "testType": "MaterializationRowCount",
                "targetOrgId": "org-a"
            })
        );
    }

    #[test]
    fn test_schedule_update_wire_format() {
        let update = ScheduleUpdate {
            cron: "0 * * * *".to_string(),
            execution_type: ExecutionType::Automatic,
            test_suite_id: SuiteId::new("S1"),
            to_be_activated: false,
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({
                "cron": "0 * * * *",
                "executionType": "automatic",
                "testSuiteId": "S1",
                "toBeActivated": false
            })
        );
    }
}
