//! Trigger command

use super::Connections;
use anyhow::{Context, Result};
use std::sync::Arc;
use vigil_cloud::{HttpExecutionService, ServiceConfig};
use vigil_core::AuthContext;
use vigil_runtime::{
    CallContext, ExecutionTrigger, PipelineConfig, Stores, TriggerOutcome, TriggerRequest,
};

pub async fn execute(
    conns: &Connections,
    auth: &AuthContext,
    request: TriggerRequest,
    ctx: &CallContext,
) -> Result<TriggerOutcome> {
    let services = ServiceConfig::from_env().context("loading service configuration")?;
    let executor = HttpExecutionService::new(&services)?;
    let pipeline = PipelineConfig::from_env()?;
    let trigger = ExecutionTrigger::new(Arc::new(executor), pipeline);

    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };

    let outcome = trigger
        .trigger(auth, &request, stores, ctx)
        .await
        .with_context(|| format!("triggering suite {}", request.test_suite_id))?;

    match outcome {
        TriggerOutcome::Executed => println!("{}: execution requested", request.test_suite_id),
        TriggerOutcome::Skipped(reason) => {
            println!("{}: skipped ({})", request.test_suite_id, reason)
        }
    }
    Ok(outcome)
}
