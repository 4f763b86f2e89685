//! Test data factories for Vigil types
//!
//! Provides pre-built suites, results and probe rows with sensible defaults.

use chrono::{DateTime, Utc};
use vigil_core::{
    CustomSpec, ExecutionType, MaterializationType, OrganizationId, QualitativeSpec,
    QualitativeTestType, QuantitativeSpec, QuantitativeTestType, SuiteProps, SuiteSpec, Target,
    TestSuite, Thresholds,
};

/// Organization fixtures
pub mod org {
    use super::*;

    pub fn primary() -> OrganizationId {
        OrganizationId::new("org-a")
    }

    pub fn other() -> OrganizationId {
        OrganizationId::new("org-b")
    }
}

/// Suite fixture factories
pub mod suite {
    use super::*;

    pub fn orders_target() -> Target {
        Target::materialization("analytics", "public", "orders", MaterializationType::Table)
    }

    pub fn quantitative_props(id: &str, execution_type: ExecutionType) -> SuiteProps {
        SuiteProps {
            id: id.to_string(),
            activated: true,
            cron: "0 * * * *".to_string(),
            execution_type: Some(execution_type),
            deleted_at: None,
            spec: SuiteSpec::Quantitative(QuantitativeSpec {
                test_type: QuantitativeTestType::MaterializationRowCount,
                target: orders_target(),
                thresholds: Thresholds::new(0.0, 0.5, 0.1),
                last_alert_sent: None,
            }),
        }
    }

    pub fn qualitative_props(id: &str, execution_type: ExecutionType) -> SuiteProps {
        SuiteProps {
            spec: SuiteSpec::Qualitative(QualitativeSpec {
                test_type: QualitativeTestType::MaterializationSchemaChange,
                target: orders_target(),
            }),
            ..quantitative_props(id, execution_type)
        }
    }

    pub fn schema_props(id: &str, execution_type: ExecutionType) -> SuiteProps {
        SuiteProps {
            spec: SuiteSpec::QualitativeSchema(QualitativeSpec {
                test_type: QualitativeTestType::MaterializationSchemaChange,
                target: orders_target(),
            }),
            ..quantitative_props(id, execution_type)
        }
    }

    pub fn custom_props(id: &str, execution_type: ExecutionType) -> SuiteProps {
        SuiteProps {
            spec: SuiteSpec::Custom(CustomSpec {
                name: "late orders".to_string(),
                description: "Orders shipped after their promise date".to_string(),
                sql_logic: "select count(*) from orders where shipped_at > promised_at"
                    .to_string(),
                target_resource_ids: vec!["analytics.public.orders".to_string()],
                thresholds: Thresholds::new(0.0, 0.5, 0.1),
                last_alert_sent: None,
            }),
            ..quantitative_props(id, execution_type)
        }
    }

    fn build(props: SuiteProps) -> TestSuite {
        TestSuite::new(props).expect("fixture suite must be valid")
    }

    pub fn quantitative(id: &str, execution_type: ExecutionType) -> TestSuite {
        build(quantitative_props(id, execution_type))
    }

    pub fn qualitative(id: &str, execution_type: ExecutionType) -> TestSuite {
        build(qualitative_props(id, execution_type))
    }

    pub fn schema(id: &str, execution_type: ExecutionType) -> TestSuite {
        build(schema_props(id, execution_type))
    }

    pub fn custom(id: &str, execution_type: ExecutionType) -> TestSuite {
        build(custom_props(id, execution_type))
    }

    pub fn deactivated(props: SuiteProps) -> TestSuite {
        build(SuiteProps {
            activated: false,
            ..props
        })
    }

    pub fn deleted(props: SuiteProps, at: DateTime<Utc>) -> TestSuite {
        build(SuiteProps {
            activated: false,
            deleted_at: Some(at),
            ..props
        })
    }

    /// Quantitative suite whose last alert went out at `at`
    pub fn alerted_at(id: &str, at: DateTime<Utc>) -> TestSuite {
        let mut props = quantitative_props(id, ExecutionType::Frequency);
        if let SuiteSpec::Quantitative(spec) = &mut props.spec {
            spec.last_alert_sent = Some(at);
        }
        build(props)
    }
}

/// Staleness probe rows
pub mod probe {
    use serde_json::Value;
    use vigil_storage::ProbeRow;

    pub fn row(altered: bool) -> ProbeRow {
        let mut row = ProbeRow::new();
        row.insert("was_altered".to_string(), Value::Bool(altered));
        row
    }

    pub fn row_with(value: Value) -> ProbeRow {
        let mut row = ProbeRow::new();
        row.insert("was_altered".to_string(), value);
        row
    }
}
