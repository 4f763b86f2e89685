//! Execution trigger
//!
//! Entry point for schedule firings and manual runs. For one suite it
//! validates routing, reads the suite, consults the staleness oracle where
//! the suite's kind calls for it, and invokes the execution service.

use crate::collaborators::{ExecuteRequest, ExecutionService};
use crate::config::PipelineConfig;
use crate::context::{CallContext, Stores};
use crate::metrics::record_trigger;
use crate::staleness::{StalenessOracle, StalenessQuery};
use crate::{conceal, Error, OperationFailed, Result};
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};
use vigil_core::{
    resolve_organization, AuthContext, ExecutionType, SuiteId, SuiteKind, TestSuite,
};

/// Which suite to trigger and for whom
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRequest {
    pub test_suite_id: SuiteId,
    pub kind: SuiteKind,
    pub execution_type: Option<ExecutionType>,
    pub target_org_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Deactivated,
    NotAltered,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Deactivated => f.write_str("suite is deactivated"),
            SkipReason::NotAltered => f.write_str("target not altered within window"),
        }
    }
}

/// What a successful trigger did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Executed,
    Skipped(SkipReason),
}

impl TriggerOutcome {
    fn label(&self) -> &'static str {
        match self {
            TriggerOutcome::Executed => "executed",
            TriggerOutcome::Skipped(SkipReason::Deactivated) => "skipped_deactivated",
            TriggerOutcome::Skipped(SkipReason::NotAltered) => "skipped_not_altered",
        }
    }
}

/// How an activated suite is gated before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    /// Run unconditionally
    Execute,
    /// Run only if the target changed; `None` derives the window from history
    Staleness { frequency_minutes: Option<i64> },
}

pub(crate) fn gate_for(
    kind: SuiteKind,
    execution_type: ExecutionType,
    config: &PipelineConfig,
) -> Result<Gate> {
    match (kind, execution_type) {
        (SuiteKind::Quantitative | SuiteKind::Custom, ExecutionType::Frequency) => Ok(Gate::Execute),
        (SuiteKind::Quantitative, ExecutionType::Automatic) => Ok(Gate::Staleness {
            frequency_minutes: None,
        }),
        (SuiteKind::Custom, ExecutionType::Automatic) => Err(Error::Unsupported(
            "automatic execution of custom suites".to_string(),
        )),
        (SuiteKind::Qualitative | SuiteKind::QualitativeSchema, ExecutionType::Automatic) => {
            Ok(Gate::Staleness {
                frequency_minutes: Some(config.automatic_lookback_minutes),
            })
        }
        (SuiteKind::Qualitative | SuiteKind::QualitativeSchema, ExecutionType::Frequency) => {
            Ok(Gate::Staleness {
                frequency_minutes: None,
            })
        }
    }
}

/// Decides whether a suite runs now and starts it
pub struct ExecutionTrigger {
    executor: Arc<dyn ExecutionService>,
    oracle: StalenessOracle,
    config: PipelineConfig,
}

impl ExecutionTrigger {
    pub fn new(executor: Arc<dyn ExecutionService>, config: PipelineConfig) -> Self {
        Self {
            executor,
            oracle: StalenessOracle::new(),
            config,
        }
    }

    /// Trigger one suite
    #[instrument(
        skip(self, auth, request, stores, ctx),
        fields(
            test_suite_id = %request.test_suite_id,
            kind = %request.kind
        )
    )]
    pub async fn trigger(
        &self,
        auth: &AuthContext,
        request: &TriggerRequest,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> std::result::Result<TriggerOutcome, OperationFailed> {
        match self.try_trigger(auth, request, stores, ctx).await {
            Ok(outcome) => {
                record_trigger(request.kind.as_str(), outcome.label());
                Ok(outcome)
            }
            Err(err) => {
                record_trigger(request.kind.as_str(), "failed");
                Err(conceal("trigger", err))
            }
        }
    }

    async fn try_trigger(
        &self,
        auth: &AuthContext,
        request: &TriggerRequest,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<TriggerOutcome> {
        let org = resolve_organization(
            auth,
            request.target_org_id.as_deref(),
            request.execution_type,
        )?;

        let suite = ctx
            .run(
                "suite read",
                stores.suites.find_one(&request.test_suite_id, &org),
            )
            .await?
            .filter(|s| !s.is_deleted() && s.kind() == request.kind)
            .ok_or_else(|| Error::SuiteNotFound(request.test_suite_id.to_string()))?;

        // The stored execution type drives the gate, so routing must hold for it too
        resolve_organization(
            auth,
            request.target_org_id.as_deref(),
            Some(suite.execution_type()),
        )?;

        if !suite.activated() {
            info!(organization_id = %org, "Suite is deactivated, skipping execution");
            return Ok(TriggerOutcome::Skipped(SkipReason::Deactivated));
        }

        if let Gate::Staleness { frequency_minutes } =
            gate_for(suite.kind(), suite.execution_type(), &self.config)?
        {
            if !self
                .target_changed(&suite, &org, frequency_minutes, stores, ctx)
                .await?
            {
                info!(
                    organization_id = %org,
                    execution_type = %suite.execution_type(),
                    "Target not altered, skipping execution"
                );
                return Ok(TriggerOutcome::Skipped(SkipReason::NotAltered));
            }
        }

        let execute = ExecuteRequest {
            test_suite_id: suite.id().clone(),
            test_type: suite.test_type(),
            target_org_id: org.clone(),
        };
        ctx.run("execution call", self.executor.execute(&execute, &auth.jwt))
            .await?;

        info!(
            organization_id = %org,
            test_type = %execute.test_type,
            "Execution requested"
        );
        Ok(TriggerOutcome::Executed)
    }

    /// Indeterminate staleness counts as changed
    async fn target_changed(
        &self,
        suite: &TestSuite,
        org: &vigil_core::OrganizationId,
        frequency_minutes: Option<i64>,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<bool> {
        let target = suite.target().ok_or_else(|| {
            Error::ContractViolation(format!("suite {} has no warehouse target", suite.id()))
        })?;

        let query = StalenessQuery {
            target,
            suite_id: suite.id(),
            category: suite.kind().category(),
            organization: org,
            frequency_minutes,
        };
        let altered = self.oracle.was_altered(query, stores, ctx).await?;
        Ok(altered.unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_suites_bypass_staleness() {
        let config = PipelineConfig::default();
        assert_eq!(
            gate_for(SuiteKind::Quantitative, ExecutionType::Frequency, &config).unwrap(),
            Gate::Execute
        );
        assert_eq!(
            gate_for(SuiteKind::Custom, ExecutionType::Frequency, &config).unwrap(),
            Gate::Execute
        );
    }

    #[test]
    fn test_automatic_quantitative_uses_history_window() {
        let config = PipelineConfig::default();
        assert_eq!(
            gate_for(SuiteKind::Quantitative, ExecutionType::Automatic, &config).unwrap(),
            Gate::Staleness {
                frequency_minutes: None
            }
        );
    }

    #[test]
    fn test_automatic_custom_is_unsupported() {
        let err = gate_for(
            SuiteKind::Custom,
            ExecutionType::Automatic,
            &PipelineConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }

    #[test]
    fn test_qualitative_windows() {
        let config = PipelineConfig {
            automatic_lookback_minutes: 7,
            ..PipelineConfig::default()
        };
        for kind in [SuiteKind::Qualitative, SuiteKind::QualitativeSchema] {
            assert_eq!(
                gate_for(kind, ExecutionType::Automatic, &config).unwrap(),
                Gate::Staleness {
                    frequency_minutes: Some(7)
                }
            );
            assert_eq!(
                gate_for(kind, ExecutionType::Frequency, &config).unwrap(),
                Gate::Staleness {
                    frequency_minutes: None
                }
            );
        }
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(TriggerOutcome::Executed.label(), "executed");
        assert_eq!(
            TriggerOutcome::Skipped(SkipReason::NotAltered).label(),
            "skipped_not_altered"
        );
    }
}
