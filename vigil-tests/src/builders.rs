//! Builders for execution results and caller identities

use chrono::{DateTime, Utc};
use vigil_core::{
    AlertData, Anomaly, AuthContext, ExecutionResult, OrganizationId, QuantitativeTestType,
    SchemaAlertData, SchemaChangeResult, SchemaDeviation, SchemaTestData, SuiteId, TestData,
    TestType,
};

/// Builder for quantitative execution results
///
/// Defaults describe an anomaly: 120 detected against bounds [50, 100],
/// 20% deviation, expected value 75.
pub struct ExecutionResultBuilder {
    suite_id: SuiteId,
    organization: OrganizationId,
    executed_on: DateTime<Utc>,
    detected_value: f64,
    upper: f64,
    lower: f64,
    deviation: f64,
    expected_value: f64,
    with_test_data: bool,
    with_anomaly: bool,
    with_alert_data: bool,
}

impl ExecutionResultBuilder {
    pub fn new(suite_id: &str, organization: &OrganizationId) -> Self {
        Self {
            suite_id: SuiteId::new(suite_id),
            organization: organization.clone(),
            executed_on: Utc::now(),
            detected_value: 120.0,
            upper: 100.0,
            lower: 50.0,
            deviation: 0.2,
            expected_value: 75.0,
            with_test_data: true,
            with_anomaly: true,
            with_alert_data: true,
        }
    }

    pub fn detected_value(mut self, value: f64) -> Self {
        self.detected_value = value;
        self
    }

    pub fn bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    pub fn deviation(mut self, deviation: f64) -> Self {
        self.deviation = deviation;
        self
    }

    pub fn expected_value(mut self, value: f64) -> Self {
        self.expected_value = value;
        self
    }

    pub fn without_test_data(mut self) -> Self {
        self.with_test_data = false;
        self
    }

    pub fn without_anomaly(mut self) -> Self {
        self.with_anomaly = false;
        self
    }

    pub fn without_alert_data(mut self) -> Self {
        self.with_alert_data = false;
        self
    }

    pub fn alert_id(&self) -> String {
        format!("alert-{}", self.suite_id)
    }

    pub fn build(self) -> ExecutionResult {
        let alert_id = self.alert_id();
        ExecutionResult {
            test_suite_id: self.suite_id,
            test_type: TestType::Quantitative(QuantitativeTestType::MaterializationRowCount),
            execution_id: "exec-1".to_string(),
            is_warmup: false,
            test_data: self.with_test_data.then(|| TestData {
                executed_on: self.executed_on,
                detected_value: self.detected_value,
                expected_upper_bound: self.upper,
                expected_lower_bound: self.lower,
                deviation: self.deviation,
                modified_z_score: 3.4,
                anomaly: self.with_anomaly.then_some(Anomaly { importance: 0.9 }),
            }),
            alert_data: self.with_alert_data.then(|| AlertData {
                alert_id,
                message: "value out of range".to_string(),
                expected_value: self.expected_value,
            }),
            target_resource_ids: vec!["analytics.public.orders".to_string()],
            organization_id: self.organization.to_string(),
        }
    }
}

/// Schema-change result with one drifted field
pub fn schema_change_result(
    suite_id: &str,
    organization: &OrganizationId,
    identical: bool,
) -> SchemaChangeResult {
    SchemaChangeResult {
        test_suite_id: SuiteId::new(suite_id),
        test_type: TestType::Qualitative(vigil_core::QualitativeTestType::MaterializationSchemaChange),
        execution_id: "exec-schema-1".to_string(),
        test_data: Some(SchemaTestData {
            executed_on: Utc::now(),
            is_identical: identical,
            deviations: if identical {
                Vec::new()
            } else {
                vec![SchemaDeviation {
                    field_name: "amount".to_string(),
                    expected_type: Some("numeric".to_string()),
                    actual_type: Some("text".to_string()),
                }]
            },
        }),
        alert_data: Some(SchemaAlertData {
            alert_id: format!("schema-alert-{}", suite_id),
        }),
        target_resource_id: "analytics.public.orders".to_string(),
        organization_id: organization.to_string(),
    }
}

/// Builder for caller identities
#[derive(Default)]
pub struct AuthContextBuilder {
    organization: Option<String>,
    system: bool,
    jwt: String,
}

impl AuthContextBuilder {
    pub fn new() -> Self {
        Self {
            jwt: "test-jwt".to_string(),
            ..Self::default()
        }
    }

    pub fn user(organization: &OrganizationId) -> Self {
        Self::new().organization(organization.as_str())
    }

    pub fn system() -> Self {
        Self {
            system: true,
            ..Self::new()
        }
    }

    pub fn organization(mut self, organization: &str) -> Self {
        self.organization = Some(organization.to_string());
        self
    }

    pub fn jwt(mut self, jwt: &str) -> Self {
        self.jwt = jwt.to_string();
        self
    }

    pub fn build(self) -> AuthContext {
        AuthContext {
            caller_org_id: self.organization,
            is_system_internal: self.system,
            jwt: self.jwt,
        }
    }
}
