//! User feedback on past alerts
//!
//! A user can mark an alert as a false positive. The verdict is always stored
//! on the execution that raised the alert; a false positive additionally
//! moves the suite's feedback threshold on the crossed side to the value that
//! was detected, so the same value does not alert again.

use crate::context::{CallContext, Stores};
use crate::metrics::record_feedback;
use crate::{conceal, Error, OperationFailed, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use vigil_core::{resolve_organization, AuthContext, OrganizationId, SuiteId, SuitePatch, ThresholdSide};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub alert_id: String,
    /// 1 confirms the anomaly, 0 marks a false positive
    pub user_feedback_is_anomaly: i32,
    #[serde(default)]
    pub detected_value: Option<f64>,
    #[serde(default)]
    pub threshold_type: Option<ThresholdSide>,
    #[serde(default)]
    pub test_suite_id: Option<SuiteId>,
    #[serde(default)]
    pub target_org_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeedbackOutcome {
    /// Verdict stored; thresholds untouched
    Recorded,
    ThresholdAdjusted { side: ThresholdSide, value: f64 },
    /// Verdict stored but the suite threshold update failed
    ThresholdUpdateFailed,
}

impl FeedbackOutcome {
    fn label(&self) -> &'static str {
        match self {
            FeedbackOutcome::Recorded => "recorded",
            FeedbackOutcome::ThresholdAdjusted { .. } => "threshold_adjusted",
            FeedbackOutcome::ThresholdUpdateFailed => "threshold_failed",
        }
    }
}

/// Threshold change requested by a false-positive verdict
#[derive(Debug, Clone, PartialEq)]
struct ThresholdFeedback {
    suite_id: SuiteId,
    side: ThresholdSide,
    value: f64,
}

/// Validated request: the anomaly flag plus, for false positives, the threshold move
fn validate(request: &FeedbackRequest) -> Result<(bool, Option<ThresholdFeedback>)> {
    if request.alert_id.trim().is_empty() {
        return Err(Error::Validation("alertId is required".to_string()));
    }
    let is_anomaly = match request.user_feedback_is_anomaly {
        0 => false,
        1 => true,
        other => {
            return Err(Error::Validation(format!(
                "userFeedbackIsAnomaly must be 0 or 1, got {}",
                other
            )))
        }
    };
    if is_anomaly {
        return Ok((true, None));
    }

    match (
        request.detected_value,
        request.threshold_type,
        request.test_suite_id.as_ref(),
    ) {
        (Some(value), Some(side), Some(suite_id)) if !suite_id.as_str().trim().is_empty() => {
            Ok((
                false,
                Some(ThresholdFeedback {
                    suite_id: suite_id.clone(),
                    side,
                    value,
                }),
            ))
        }
        _ => Err(Error::Validation(
            "detectedValue, thresholdType and testSuiteId are required for false positives"
                .to_string(),
        )),
    }
}

/// Applies user feedback to execution history and suite thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackProcessor;

impl FeedbackProcessor {
    pub fn new() -> Self {
        Self
    }

    #[instrument(
        skip(self, auth, request, stores, ctx),
        fields(alert_id = %request.alert_id)
    )]
    pub async fn process(
        &self,
        auth: &AuthContext,
        request: &FeedbackRequest,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<FeedbackOutcome, OperationFailed> {
        match self.try_process(auth, request, stores, ctx).await {
            Ok(outcome) => {
                record_feedback(outcome.label());
                Ok(outcome)
            }
            Err(err) => {
                record_feedback("failed");
                Err(conceal("feedback", err))
            }
        }
    }

    async fn try_process(
        &self,
        auth: &AuthContext,
        request: &FeedbackRequest,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<FeedbackOutcome> {
        let org = resolve_organization(auth, request.target_org_id.as_deref(), None)?;
        let (is_anomaly, threshold) = validate(request)?;

        ctx.run(
            "feedback write",
            stores
                .history
                .record_feedback(&request.alert_id, is_anomaly, &org),
        )
        .await?;
        info!(organization_id = %org, is_anomaly, "Feedback recorded");

        let Some(threshold) = threshold else {
            return Ok(FeedbackOutcome::Recorded);
        };

        match self.adjust_threshold(&threshold, &org, stores, ctx).await {
            Ok(()) => {
                info!(
                    organization_id = %org,
                    test_suite_id = %threshold.suite_id,
                    side = %threshold.side,
                    value = threshold.value,
                    "Feedback threshold updated"
                );
                Ok(FeedbackOutcome::ThresholdAdjusted {
                    side: threshold.side,
                    value: threshold.value,
                })
            }
            Err(err) => {
                warn!(
                    organization_id = %org,
                    test_suite_id = %threshold.suite_id,
                    error = %err,
                    "Feedback recorded but suite threshold update failed"
                );
                Ok(FeedbackOutcome::ThresholdUpdateFailed)
            }
        }
    }

    async fn adjust_threshold(
        &self,
        threshold: &ThresholdFeedback,
        org: &OrganizationId,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<()> {
        let suite = ctx
            .run("suite read", stores.suites.find_one(&threshold.suite_id, org))
            .await?
            .filter(|s| !s.is_deleted())
            .ok_or_else(|| Error::SuiteNotFound(threshold.suite_id.to_string()))?;

        let updated = suite.patched(&SuitePatch::feedback_threshold(
            threshold.side,
            threshold.value,
        ))?;
        ctx.run("suite update", stores.suites.replace_many(&[updated], org))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(flag: i32) -> FeedbackRequest {
        FeedbackRequest {
            alert_id: "alert-1".to_string(),
            user_feedback_is_anomaly: flag,
            detected_value: Some(42.0),
            threshold_type: Some(ThresholdSide::Upper),
            test_suite_id: Some(SuiteId::new("S1")),
            target_org_id: None,
        }
    }

    #[test]
    fn test_confirmed_anomaly_needs_no_threshold_fields() {
        let mut req = request(1);
        req.detected_value = None;
        req.threshold_type = None;
        req.test_suite_id = None;
        assert_eq!(validate(&req).unwrap(), (true, None));
    }

    #[test]
    fn test_false_positive_moves_threshold() {
        let (is_anomaly, threshold) = validate(&request(0)).unwrap();
        assert!(!is_anomaly);
        assert_eq!(
            threshold,
            Some(ThresholdFeedback {
                suite_id: SuiteId::new("S1"),
                side: ThresholdSide::Upper,
                value: 42.0,
            })
        );
    }

    #[test]
    fn test_false_positive_requires_all_fields() {
        for field in 0..3 {
            let mut req = request(0);
            match field {
                0 => req.detected_value = None,
                1 => req.threshold_type = None,
                _ => req.test_suite_id = None,
            }
            assert!(matches!(validate(&req), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_flag_must_be_binary() {
        assert!(matches!(validate(&request(2)), Err(Error::Validation(_))));
        assert!(matches!(validate(&request(-1)), Err(Error::Validation(_))));
    }

    #[test]
    fn test_request_wire_format() {
        let req: FeedbackRequest = serde_json::from_value(serde_json::json!({
            "alertId": "alert-1",
            "userFeedbackIsAnomaly": 0,
            "detectedValue": 42,
            "thresholdType": "upper",
            "testSuiteId": "S1"
        }))
        .unwrap();
        assert_eq!(req, request(0));
    }
}
