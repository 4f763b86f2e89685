//! Database models for Vigil metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use vigil_core::{
    CustomSpec, CustomThresholds, ExecutionType, MaterializationType, OrganizationId,
    QualitativeSpec, QualitativeTestType, QuantitativeSpec, QuantitativeTestType, SuiteKind,
    SuiteProps, SuiteSpec, Target, TestSuite, ThresholdMode, Thresholds,
};

/// Test suite row
///
/// One wide table holds every suite kind; columns a kind does not use are
/// NULL.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestSuiteModel {
    pub id: String,
    pub organization_id: String,
    pub kind: String,
    pub test_type: String,
    pub activated: bool,
    pub cron: String,
    pub execution_type: String,
    pub database_name: Option<String>,
    pub schema_name: Option<String>,
    pub materialization_name: Option<String>,
    pub materialization_type: Option<String>,
    pub column_name: Option<String>,
    pub threshold: Option<f64>,
    pub importance_threshold: Option<f64>,
    pub bounds_interval_relative: Option<f64>,
    pub custom_lower_threshold: Option<f64>,
    pub custom_upper_threshold: Option<f64>,
    pub custom_threshold_mode: Option<String>,
    pub feedback_lower_threshold: Option<f64>,
    pub feedback_upper_threshold: Option<f64>,
    pub last_alert_sent: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub sql_logic: Option<String>,
    pub target_resource_ids: Json<Vec<String>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TestSuiteModel {
    /// Flatten a suite into its row form
    pub fn from_suite(suite: &TestSuite, org: &OrganizationId) -> Self {
        let mut model = Self {
            id: suite.id().to_string(),
            organization_id: org.as_str().to_string(),
            kind: suite.kind().as_str().to_string(),
            test_type: suite.test_type().to_string(),
            activated: suite.activated(),
            cron: suite.cron().to_string(),
            execution_type: suite.execution_type().as_str().to_string(),
            database_name: None,
            schema_name: None,
            materialization_name: None,
            materialization_type: None,
            column_name: None,
            threshold: None,
            importance_threshold: None,
            bounds_interval_relative: None,
            custom_lower_threshold: None,
            custom_upper_threshold: None,
            custom_threshold_mode: None,
            feedback_lower_threshold: None,
            feedback_upper_threshold: None,
            last_alert_sent: suite.last_alert_sent(),
            name: None,
            description: None,
            sql_logic: None,
            target_resource_ids: Json(suite.target_resource_ids()),
            deleted_at: suite.deleted_at(),
        };

        if let Some(target) = suite.target() {
            model.database_name = Some(target.database_name.clone());
            model.schema_name = Some(target.schema_name.clone());
            model.materialization_name = Some(target.materialization_name.clone());
            model.materialization_type = Some(target.materialization_type.as_str().to_string());
            model.column_name = target.column_name.clone();
        }

        if let Some(t) = suite.thresholds() {
            model.threshold = Some(t.threshold);
            model.importance_threshold = Some(t.importance_threshold);
            model.bounds_interval_relative = Some(t.bounds_interval_relative);
            model.feedback_lower_threshold = t.feedback_lower_threshold;
            model.feedback_upper_threshold = t.feedback_upper_threshold;
            if let Some(custom) = t.custom {
                model.custom_lower_threshold = custom.lower;
                model.custom_upper_threshold = custom.upper;
                model.custom_threshold_mode = Some(custom.mode.as_str().to_string());
            }
        }

        if let SuiteSpec::Custom(spec) = suite.spec() {
            model.name = Some(spec.name.clone());
            model.description = Some(spec.description.clone());
            model.sql_logic = Some(spec.sql_logic.clone());
        }

        model
    }

    /// Rebuild the suite through its validating constructor
    pub fn into_suite(self) -> crate::Result<TestSuite> {
        let id = self.id.clone();
        let corrupt = |reason: String| crate::Error::Corrupt {
            id: id.clone(),
            reason,
        };

        let kind = self.kind.parse::<SuiteKind>().map_err(|e| corrupt(format!("{}", e)))?;
        let spec = match kind {
            SuiteKind::Quantitative => SuiteSpec::Quantitative(QuantitativeSpec {
                test_type: self
                    .test_type
                    .parse::<QuantitativeTestType>()
                    .map_err(|e| corrupt(format!("{}", e)))?,
                target: self.target().map_err(&corrupt)?,
                thresholds: self.thresholds().map_err(&corrupt)?,
                last_alert_sent: self.last_alert_sent,
            }),
            SuiteKind::Qualitative | SuiteKind::QualitativeSchema => {
                let spec = QualitativeSpec {
                    test_type: self
                        .test_type
                        .parse::<QualitativeTestType>()
                        .map_err(|e| corrupt(format!("{}", e)))?,
                    target: self.target().map_err(&corrupt)?,
                };
                if kind == SuiteKind::Qualitative {
                    SuiteSpec::Qualitative(spec)
                } else {
                    SuiteSpec::QualitativeSchema(spec)
                }
            }
            SuiteKind::Custom => SuiteSpec::Custom(CustomSpec {
                name: self.name.clone().unwrap_or_default(),
                description: self.description.clone().unwrap_or_default(),
                sql_logic: self.sql_logic.clone().unwrap_or_default(),
                target_resource_ids: self.target_resource_ids.0.clone(),
                thresholds: self.thresholds().map_err(&corrupt)?,
                last_alert_sent: self.last_alert_sent,
            }),
        };

        let execution_type = self
            .execution_type
            .parse::<ExecutionType>()
            .map_err(|e| corrupt(format!("{}", e)))?;

        TestSuite::new(SuiteProps {
            id: self.id,
            activated: self.activated,
            cron: self.cron,
            execution_type: Some(execution_type),
            deleted_at: self.deleted_at,
            spec,
        })
        .map_err(|e| corrupt(e.to_string()))
    }

    fn target(&self) -> std::result::Result<Target, String> {
        let materialization_type = self
            .materialization_type
            .as_deref()
            .ok_or("missing materialization_type")?
            .parse::<MaterializationType>()
            .map_err(|e| format!("{}", e))?;
        Ok(Target {
            database_name: self.database_name.clone().ok_or("missing database_name")?,
            schema_name: self.schema_name.clone().ok_or("missing schema_name")?,
            materialization_name: self
                .materialization_name
                .clone()
                .ok_or("missing materialization_name")?,
            materialization_type,
            column_name: self.column_name.clone(),
        })
    }

    fn thresholds(&self) -> std::result::Result<Thresholds, String> {
        let custom = match self.custom_threshold_mode.as_deref() {
            Some(mode) => Some(CustomThresholds {
                lower: self.custom_lower_threshold,
                upper: self.custom_upper_threshold,
                mode: mode.parse::<ThresholdMode>().map_err(|e| format!("{}", e))?,
            }),
            None => None,
        };
        Ok(Thresholds {
            threshold: self.threshold.ok_or("missing threshold")?,
            importance_threshold: self
                .importance_threshold
                .ok_or("missing importance_threshold")?,
            bounds_interval_relative: self
                .bounds_interval_relative
                .ok_or("missing bounds_interval_relative")?,
            custom,
            feedback_lower_threshold: self.feedback_lower_threshold,
            feedback_upper_threshold: self.feedback_upper_threshold,
        })
    }
}

/// Execution history row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestHistoryModel {
    pub id: String,
    pub organization_id: String,
    pub test_suite_id: String,
    pub category: String,
    pub execution_id: String,
    pub executed_on: DateTime<Utc>,
    pub alert_id: Option<String>,
    pub user_feedback_is_anomaly: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantitative_suite() -> TestSuite {
        let mut thresholds = Thresholds::new(3.0, 0.5, 0.1);
        thresholds.custom = Some(CustomThresholds {
            lower: Some(1.0),
            upper: None,
            mode: ThresholdMode::Relative,
        });
        thresholds.feedback_upper_threshold = Some(42.0);
        TestSuite::new(SuiteProps {
            id: "S1".to_string(),
            activated: true,
            cron: "0 * * * *".to_string(),
            execution_type: Some(ExecutionType::Automatic),
            deleted_at: None,
            spec: SuiteSpec::Quantitative(QuantitativeSpec {
                test_type: QuantitativeTestType::ColumnNullness,
                target: Target::materialization("DB", "SCH", "ORDERS", MaterializationType::View)
                    .with_column("AMOUNT"),
                thresholds,
                last_alert_sent: Some(Utc::now()),
            }),
        })
        .unwrap()
    }

    #[test]
    fn test_row_rebuilds_same_suite() {
        let suite = quantitative_suite();
        let model = TestSuiteModel::from_suite(&suite, &OrganizationId::new("org-a"));
        assert_eq!(model.kind, "quantitative");
        assert_eq!(model.materialization_type.as_deref(), Some("View"));
        assert_eq!(model.custom_threshold_mode.as_deref(), Some("relative"));
        assert_eq!(model.into_suite().unwrap(), suite);
    }

    #[test]
    fn test_invalid_row_is_corrupt() {
        let mut model =
            TestSuiteModel::from_suite(&quantitative_suite(), &OrganizationId::new("org-a"));
        model.test_type = "MaterializationRowCount".to_string();
        let err = model.into_suite().unwrap_err();
        assert!(matches!(err, crate::Error::Corrupt { ref id, .. } if id == "S1"));

        let mut model =
            TestSuiteModel::from_suite(&quantitative_suite(), &OrganizationId::new("org-a"));
        model.threshold = None;
        assert!(matches!(
            model.into_suite(),
            Err(crate::Error::Corrupt { .. })
        ));
    }
}
