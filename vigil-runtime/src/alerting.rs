//! Result handling and alert dispatch
//!
//! Turns execution results into alerts. Anomaly alerts are rate limited per
//! suite: once one has been sent, further alerts for that suite are
//! suppressed until the sleep window has passed.

use crate::collaborators::{
    AlertMessage, AlertSender, AnomalyAlert, ChartGenerator, SchemaChangeAlert,
};
use crate::config::PipelineConfig;
use crate::context::{CallContext, Stores};
use crate::metrics::record_alert;
use crate::{conceal, Error, OperationFailed, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use vigil_core::{
    resolve_organization, AnomalyReport, AuthContext, ExecutionResult, OrganizationId,
    SchemaChangeResult, SuiteId, SuitePatch, TestSuite, ThresholdSide,
};

/// What handling a result led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    Sent { alert_id: String },
    Suppressed,
    NoAnomaly,
}

impl AlertOutcome {
    fn label(&self) -> &'static str {
        match self {
            AlertOutcome::Sent { .. } => "sent",
            AlertOutcome::Suppressed => "suppressed",
            AlertOutcome::NoAnomaly => "no_anomaly",
        }
    }
}

/// Returns true while alerts for a suite are suppressed
pub fn is_sleeping(last_alert_sent: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    now - last_alert_sent < window
}

/// Which bound `detected` crossed; a value within bounds is not an anomaly
pub fn threshold_side(detected: f64, upper: f64, lower: f64) -> Result<ThresholdSide> {
    if detected > upper {
        Ok(ThresholdSide::Upper)
    } else if detected < lower {
        Ok(ThresholdSide::Lower)
    } else {
        Err(Error::ContractViolation(format!(
            "anomalous value {} lies within expected bounds [{}, {}]",
            detected, lower, upper
        )))
    }
}

/// Integer form for whole numbers, four decimals otherwise
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.4}", value)
    }
}

/// Relative deviation as a percentage with two decimals
pub fn format_deviation(deviation: f64) -> String {
    format!("{:.2}", deviation * 100.0)
}

pub fn explanation(
    value: &str,
    name: &str,
    side: ThresholdSide,
    deviation_pct: &str,
    expected: &str,
) -> String {
    let direction = match side {
        ThresholdSide::Upper => "high",
        ThresholdSide::Lower => "low",
    };
    format!(
        "A value of {} was detected for the test {}. That's unusually {}, with a deviation of {}% based on an expected average value of {}.",
        value, name, direction, deviation_pct, expected
    )
}

fn anomaly_alert(suite: &TestSuite, report: &AnomalyReport<'_>, chart_url: String) -> Result<AnomalyAlert> {
    let data = report.test_data;
    let side = threshold_side(
        data.detected_value,
        data.expected_upper_bound,
        data.expected_lower_bound,
    )?;
    let name = suite.display_name();
    let detected = format_value(data.detected_value);
    let deviation = format_deviation(data.deviation);
    let message = explanation(
        &detected,
        &name,
        side,
        &deviation,
        &format_value(report.alert_data.expected_value),
    );

    Ok(AnomalyAlert {
        alert_id: report.alert_data.alert_id.clone(),
        test_type: suite.test_type(),
        name,
        expected_upper_bound: format_value(data.expected_upper_bound),
        expected_lower_bound: format_value(data.expected_lower_bound),
        deviation,
        chart_url,
        detected_value: detected,
        threshold_side: side,
        test_suite_id: suite.id().clone(),
        message,
    })
}

/// Consumes execution results and dispatches alerts
pub struct ResultHandler {
    charts: Arc<dyn ChartGenerator>,
    sender: Arc<dyn AlertSender>,
    config: PipelineConfig,
}

impl ResultHandler {
    pub fn new(
        charts: Arc<dyn ChartGenerator>,
        sender: Arc<dyn AlertSender>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            charts,
            sender,
            config,
        }
    }

    /// Handle a quantitative or custom execution result
    #[instrument(
        skip(self, auth, result, stores, ctx),
        fields(
            test_suite_id = %result.test_suite_id,
            execution_id = %result.execution_id
        )
    )]
    pub async fn handle_result(
        &self,
        auth: &AuthContext,
        result: &ExecutionResult,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<AlertOutcome, OperationFailed> {
        let outcome = self.try_handle_result(auth, result, stores, ctx).await;
        self.finish(outcome)
    }

    /// Handle a schema-change execution result
    #[instrument(
        skip(self, auth, result, stores, ctx),
        fields(
            test_suite_id = %result.test_suite_id,
            execution_id = %result.execution_id
        )
    )]
    pub async fn handle_schema_change(
        &self,
        auth: &AuthContext,
        result: &SchemaChangeResult,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<AlertOutcome, OperationFailed> {
        let outcome = self.try_handle_schema_change(auth, result, stores, ctx).await;
        self.finish(outcome)
    }

    fn finish(&self, outcome: Result<AlertOutcome>) -> std::result::Result<AlertOutcome, OperationFailed> {
        match outcome {
            Ok(outcome) => {
                record_alert(outcome.label());
                Ok(outcome)
            }
            Err(err) => {
                record_alert("failed");
                Err(conceal("handle_result", err))
            }
        }
    }

    async fn load_suite(
        &self,
        id: &SuiteId,
        org: &OrganizationId,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<TestSuite> {
        ctx.run("suite read", stores.suites.find_one(id, org))
            .await?
            .filter(|s| !s.is_deleted())
            .ok_or_else(|| Error::SuiteNotFound(id.to_string()))
    }

    async fn try_handle_result(
        &self,
        auth: &AuthContext,
        result: &ExecutionResult,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<AlertOutcome> {
        let org = resolve_organization(auth, Some(&result.organization_id), None)?;
        let suite = self
            .load_suite(&result.test_suite_id, &org, stores, ctx)
            .await?;

        if let Some(last) = suite.last_alert_sent() {
            if is_sleeping(last, ctx.now(), self.config.sleep_window) {
                info!(
                    organization_id = %org,
                    last_alert_sent = %last,
                    "Suite is in sleep mode, suppressing alert"
                );
                return Ok(AlertOutcome::Suppressed);
            }
        }

        let Some(report) = result.anomaly_report() else {
            return Ok(AlertOutcome::NoAnomaly);
        };

        threshold_side(
            report.test_data.detected_value,
            report.test_data.expected_upper_bound,
            report.test_data.expected_lower_bound,
        )?;

        let chart = ctx
            .run(
                "chart generation",
                self.charts.generate_chart(suite.id(), &org),
            )
            .await?;
        let alert = anomaly_alert(&suite, &report, chart.url)?;
        let alert_id = alert.alert_id.clone();

        self.deliver(AlertMessage::Anomaly(alert), &org, auth, ctx)
            .await?;

        let patch = SuitePatch::alert_sent(ctx.now());
        if let Err(err) = self.mark_alert_sent(&suite, &patch, &org, stores, ctx).await {
            warn!(
                organization_id = %org,
                error = %err,
                "Alert delivered but lastAlertSent could not be updated"
            );
        }

        Ok(AlertOutcome::Sent { alert_id })
    }

    async fn try_handle_schema_change(
        &self,
        auth: &AuthContext,
        result: &SchemaChangeResult,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<AlertOutcome> {
        let org = resolve_organization(auth, Some(&result.organization_id), None)?;
        let suite = self
            .load_suite(&result.test_suite_id, &org, stores, ctx)
            .await?;

        let Some((data, alert_data)) = result.schema_change() else {
            return Ok(AlertOutcome::NoAnomaly);
        };

        let name = suite.display_name();
        let fields: Vec<&str> = data
            .deviations
            .iter()
            .map(|d| d.field_name.as_str())
            .collect();
        let message = format!(
            "The schema of {} changed. Affected fields: {}.",
            name,
            fields.join(", ")
        );
        let alert = SchemaChangeAlert {
            alert_id: alert_data.alert_id.clone(),
            test_type: suite.test_type(),
            name,
            test_suite_id: suite.id().clone(),
            target_resource_id: result.target_resource_id.clone(),
            deviations: data.deviations.clone(),
            message,
        };

        self.deliver(AlertMessage::SchemaChange(alert), &org, auth, ctx)
            .await?;
        Ok(AlertOutcome::Sent {
            alert_id: alert_data.alert_id.clone(),
        })
    }

    async fn deliver(
        &self,
        message: AlertMessage,
        org: &OrganizationId,
        auth: &AuthContext,
        ctx: &CallContext,
    ) -> Result<()> {
        let receipt = ctx
            .run(
                "alert delivery",
                self.sender.send_alert(&message, org, &auth.jwt),
            )
            .await?;
        if !receipt.delivered {
            return Err(Error::DeliveryFailed(message.alert_id().to_string()));
        }
        info!(
            organization_id = %org,
            alert_id = %message.alert_id(),
            message_id = ?receipt.message_id,
            "Alert delivered"
        );
        Ok(())
    }

    async fn mark_alert_sent(
        &self,
        suite: &TestSuite,
        patch: &SuitePatch,
        org: &OrganizationId,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<()> {
        let updated = suite.patched(patch)?;
        ctx.run("suite update", stores.suites.replace_many(&[updated], org))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sleep_mode_boundary() {
        let now = Utc::now();
        let window = Duration::hours(24);
        assert!(is_sleeping(
            now - Duration::hours(23) - Duration::minutes(59),
            now,
            window
        ));
        assert!(!is_sleeping(
            now - Duration::hours(24) - Duration::minutes(1),
            now,
            window
        ));
        assert!(!is_sleeping(now - window, now, window));
    }

    #[test]
    fn test_threshold_side_classification() {
        assert_eq!(threshold_side(120.0, 100.0, 50.0).unwrap(), ThresholdSide::Upper);
        assert_eq!(threshold_side(10.0, 100.0, 50.0).unwrap(), ThresholdSide::Lower);
        assert!(matches!(
            threshold_side(75.0, 100.0, 50.0),
            Err(Error::ContractViolation(_))
        ));
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(120.0), "120");
        assert_eq!(format_value(3.14159265), "3.1416");
        assert_eq!(format_value(-2.5), "-2.5000");
    }

    #[test]
    fn test_format_deviation() {
        assert_eq!(format_deviation(0.2), "20.00");
        assert_eq!(format_deviation(-0.12346), "-12.35");
    }

    #[test]
    fn test_explanation_text() {
        let text = explanation("120", "late orders", ThresholdSide::Upper, "20.00", "75");
        assert_eq!(
            text,
            "A value of 120 was detected for the test late orders. That's unusually high, \
             with a deviation of 20.00% based on an expected average value of 75."
        );
        assert!(explanation("10", "x", ThresholdSide::Lower, "-80.00", "50").contains("unusually low"));
    }
}
