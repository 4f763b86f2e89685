//! Handle-result command: feed a stored execution result through alerting

use super::Connections;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use vigil_cloud::{HttpAlertSender, HttpChartGenerator, ServiceConfig};
use vigil_core::{AuthContext, ExecutionResult, SchemaChangeResult};
use vigil_runtime::{AlertOutcome, CallContext, PipelineConfig, ResultHandler, Stores};

pub async fn execute(
    conns: &Connections,
    auth: &AuthContext,
    file: &Path,
    schema_change: bool,
    ctx: &CallContext,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let services = ServiceConfig::from_env().context("loading service configuration")?;
    let handler = ResultHandler::new(
        Arc::new(HttpChartGenerator::new(&services)?),
        Arc::new(HttpAlertSender::new(&services)?),
        PipelineConfig::from_env()?,
    );

    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };

    let outcome = if schema_change {
        let result: SchemaChangeResult =
            serde_json::from_str(&raw).context("parsing schema-change result")?;
        handler
            .handle_schema_change(auth, &result, stores, ctx)
            .await
            .context("handling schema-change result")?
    } else {
        let result: ExecutionResult =
            serde_json::from_str(&raw).context("parsing execution result")?;
        handler
            .handle_result(auth, &result, stores, ctx)
            .await
            .context("handling execution result")?
    };

    match outcome {
        AlertOutcome::Sent { alert_id } => println!("Alert {} sent", alert_id),
        AlertOutcome::Suppressed => println!("Alert suppressed (sleep mode)"),
        AlertOutcome::NoAnomaly => println!("No anomaly"),
    }
    Ok(())
}
