//! Execution results reported back by the test-execution service

use crate::suite::{SuiteId, TestType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anomaly flag attached to a quantitative measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    pub importance: f64,
}

/// Measurement produced by a quantitative or custom test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestData {
    pub executed_on: DateTime<Utc>,
    pub detected_value: f64,
    pub expected_upper_bound: f64,
    pub expected_lower_bound: f64,
    pub deviation: f64,
    pub modified_z_score: f64,
    #[serde(default)]
    pub anomaly: Option<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertData {
    pub alert_id: String,
    pub message: String,
    pub expected_value: f64,
}

/// Result of a quantitative or custom execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub test_suite_id: SuiteId,
    pub test_type: TestType,
    pub execution_id: String,
    #[serde(default)]
    pub is_warmup: bool,
    #[serde(default)]
    pub test_data: Option<TestData>,
    #[serde(default)]
    pub alert_data: Option<AlertData>,
    #[serde(default)]
    pub target_resource_ids: Vec<String>,
    pub organization_id: String,
}

/// The parts of a result an alert is built from
#[derive(Debug, Clone, Copy)]
pub struct AnomalyReport<'a> {
    pub test_data: &'a TestData,
    pub anomaly: &'a Anomaly,
    pub alert_data: &'a AlertData,
}

impl ExecutionResult {
    /// Returns the anomaly to alert on, if the result carries one
    ///
    /// A result is only alertable when the measurement, its anomaly flag and
    /// the alert data are all present. Any partial combination counts as
    /// "no anomaly".
    pub fn anomaly_report(&self) -> Option<AnomalyReport<'_>> {
        let test_data = self.test_data.as_ref()?;
        let anomaly = test_data.anomaly.as_ref()?;
        let alert_data = self.alert_data.as_ref()?;
        Some(AnomalyReport {
            test_data,
            anomaly,
            alert_data,
        })
    }
}

/// One field whose type no longer matches the recorded schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDeviation {
    pub field_name: String,
    #[serde(default)]
    pub expected_type: Option<String>,
    #[serde(default)]
    pub actual_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTestData {
    pub executed_on: DateTime<Utc>,
    pub is_identical: bool,
    #[serde(default)]
    pub deviations: Vec<SchemaDeviation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAlertData {
    pub alert_id: String,
}

/// Result of a schema-change execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaChangeResult {
    pub test_suite_id: SuiteId,
    pub test_type: TestType,
    pub execution_id: String,
    #[serde(default)]
    pub test_data: Option<SchemaTestData>,
    #[serde(default)]
    pub alert_data: Option<SchemaAlertData>,
    pub target_resource_id: String,
    pub organization_id: String,
}

impl SchemaChangeResult {
    /// Returns the detected change, if any
    pub fn schema_change(&self) -> Option<(&SchemaTestData, &SchemaAlertData)> {
        let test_data = self.test_data.as_ref().filter(|d| !d.is_identical)?;
        let alert_data = self.alert_data.as_ref()?;
        Some((test_data, alert_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::QuantitativeTestType;

    fn result(with_anomaly: bool, with_alert: bool) -> ExecutionResult {
        ExecutionResult {
            test_suite_id: SuiteId::new("S1"),
            test_type: TestType::Quantitative(QuantitativeTestType::MaterializationRowCount),
            execution_id: "exec-1".to_string(),
            is_warmup: false,
            test_data: Some(TestData {
                executed_on: Utc::now(),
                detected_value: 120.0,
                expected_upper_bound: 100.0,
                expected_lower_bound: 50.0,
                deviation: 0.2,
                modified_z_score: 3.1,
                anomaly: with_anomaly.then_some(Anomaly { importance: 0.9 }),
            }),
            alert_data: with_alert.then(|| AlertData {
                alert_id: "alert-1".to_string(),
                message: "row count spiked".to_string(),
                expected_value: 75.0,
            }),
            target_resource_ids: vec!["res-1".to_string()],
            organization_id: "org-a".to_string(),
        }
    }

    #[test]
    fn test_anomaly_report_requires_all_parts() {
        assert!(result(true, true).anomaly_report().is_some());
        assert!(result(true, false).anomaly_report().is_none());
        assert!(result(false, true).anomaly_report().is_none());
        assert!(result(false, false).anomaly_report().is_none());

        let mut no_data = result(true, true);
        no_data.test_data = None;
        assert!(no_data.anomaly_report().is_none());
    }

    #[test]
    fn test_execution_result_wire_format() {
        let json = serde_json::json!({
            "testSuiteId": "S1",
            "testType": "ColumnNullness",
            "executionId": "exec-9",
            "isWarmup": true,
            "organizationId": "org-a"
        });
        let parsed: ExecutionResult = serde_json::from_value(json).unwrap();
        assert_eq!(
            parsed.test_type,
            TestType::Quantitative(QuantitativeTestType::ColumnNullness)
        );
        assert!(parsed.is_warmup);
        assert!(parsed.test_data.is_none());
        assert!(parsed.target_resource_ids.is_empty());
    }

    #[test]
    fn test_schema_change_detection() {
        let mut result = SchemaChangeResult {
            test_suite_id: SuiteId::new("S2"),
            test_type: "MaterializationSchemaChange".parse().unwrap(),
            execution_id: "exec-2".to_string(),
            test_data: Some(SchemaTestData {
                executed_on: Utc::now(),
                is_identical: false,
                deviations: vec![SchemaDeviation {
                    field_name: "AMOUNT".to_string(),
                    expected_type: Some("NUMBER".to_string()),
                    actual_type: Some("VARCHAR".to_string()),
                }],
            }),
            alert_data: Some(SchemaAlertData {
                alert_id: "alert-2".to_string(),
            }),
            target_resource_id: "res-1".to_string(),
            organization_id: "org-a".to_string(),
        };
        assert!(result.schema_change().is_some());

        if let Some(data) = result.test_data.as_mut() {
            data.is_identical = true;
        }
        assert!(result.schema_change().is_none());
    }
}
