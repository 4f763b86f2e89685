//! Staleness oracle
//!
//! Decides whether a materialization changed recently enough to be worth
//! testing. The lookback window is either given explicitly or derived from
//! the time since the suite last ran.

use crate::context::{CallContext, Stores};
use crate::metrics::STALENESS_PROBE_DURATION_SECONDS;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, instrument};
use vigil_core::{OrganizationId, SuiteCategory, SuiteId, Target};
use vigil_storage::StalenessProbe;

/// What to check and over which window
#[derive(Debug, Clone, Copy)]
pub struct StalenessQuery<'q> {
    pub target: &'q Target,
    pub suite_id: &'q SuiteId,
    pub category: SuiteCategory,
    pub organization: &'q OrganizationId,
    /// Explicit window; history is not consulted when set
    pub frequency_minutes: Option<i64>,
}

/// Answers "was this target altered within the lookback window?"
#[derive(Debug, Clone, Copy, Default)]
pub struct StalenessOracle;

impl StalenessOracle {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` when there is no history to derive a window from
    #[instrument(
        skip(self, query, stores, ctx),
        fields(
            organization_id = %query.organization,
            test_suite_id = %query.suite_id,
            category = %query.category
        )
    )]
    pub async fn was_altered(
        &self,
        query: StalenessQuery<'_>,
        stores: Stores<'_>,
        ctx: &CallContext,
    ) -> Result<Option<bool>> {
        let lookback_minutes = match query.frequency_minutes {
            Some(minutes) => minutes,
            None => {
                let last = ctx
                    .run(
                        "history lookup",
                        stores.history.last_execution_at(
                            query.suite_id,
                            query.category,
                            query.organization,
                        ),
                    )
                    .await?;
                match last {
                    Some(last) => lookback_minutes(last, ctx.now()),
                    None => {
                        info!("No previous execution, staleness is indeterminate");
                        return Ok(None);
                    }
                }
            }
        };
        debug!(lookback_minutes, "Resolved staleness window");

        let probe = StalenessProbe {
            database_name: query.target.database_name.clone(),
            schema_name: query.target.schema_name.clone(),
            materialization_name: query.target.materialization_name.clone(),
            lookback_minutes,
        };

        let timer = STALENESS_PROBE_DURATION_SECONDS.start_timer();
        let rows = ctx
            .run("staleness probe", stores.warehouse.query(&probe))
            .await;
        timer.observe_duration();
        let rows = rows?;

        let row = match rows.as_slice() {
            [row] => row,
            _ => {
                return Err(Error::Probe(format!(
                    "expected exactly one row for {}, got {}",
                    query.target.qualified_name(),
                    rows.len()
                )))
            }
        };
        let altered = match row.get("was_altered") {
            Some(Value::Bool(altered)) => *altered,
            other => {
                return Err(Error::Probe(format!(
                    "was_altered must be a boolean, got {}",
                    other.map_or_else(|| "nothing".to_string(), Value::to_string)
                )))
            }
        };

        info!(
            lookback_minutes,
            was_altered = altered,
            target = %query.target.qualified_name(),
            "Staleness probe completed"
        );
        Ok(Some(altered))
    }
}

/// Whole minutes elapsed since `last`, rounded up, never below one
pub fn lookback_minutes(last: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let elapsed_ms = (now - last).num_milliseconds();
    let minutes = (elapsed_ms as f64 / 60_000.0).ceil() as i64;
    minutes.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_lookback_uses_exact_minutes() {
        let now = Utc::now();
        assert_eq!(lookback_minutes(now - Duration::minutes(12), now), 12);
    }

    #[test]
    fn test_lookback_rounds_up() {
        let now = Utc::now();
        let last = now - Duration::minutes(12) - Duration::seconds(1);
        assert_eq!(lookback_minutes(last, now), 13);
    }

    #[test]
    fn test_lookback_is_at_least_one_minute() {
        let now = Utc::now();
        assert_eq!(lookback_minutes(now, now), 1);
        assert_eq!(lookback_minutes(now + Duration::minutes(3), now), 1);
    }
}
