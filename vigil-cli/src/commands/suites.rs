//! Suite lifecycle commands

use super::{print_json, Connections};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use vigil_cloud::{HttpScheduleRegistry, ServiceConfig};
use vigil_core::{AuthContext, SuiteId, SuiteKind, SuiteProps};
use vigil_runtime::{CallContext, Stores, SuiteService};
use vigil_storage::SuiteFilter;

fn service() -> Result<SuiteService> {
    let services = ServiceConfig::from_env().context("loading service configuration")?;
    Ok(SuiteService::new(Arc::new(HttpScheduleRegistry::new(
        &services,
    )?)))
}

pub async fn list(
    conns: &Connections,
    auth: &AuthContext,
    target_org: Option<&str>,
    kind: Option<SuiteKind>,
    activated: Option<bool>,
    ctx: &CallContext,
) -> Result<()> {
    let mut filter = SuiteFilter::default().deleted(false);
    if let Some(kind) = kind {
        filter = filter.kind(kind);
    }
    if let Some(activated) = activated {
        filter = filter.activated(activated);
    }

    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };
    let suites = service()?
        .read_many(auth, target_org, &filter, stores, ctx)
        .await
        .context("listing suites")?;

    for suite in &suites {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            suite.id(),
            suite.kind(),
            suite.execution_type(),
            if suite.activated() { "active" } else { "inactive" },
            suite.display_name()
        );
    }
    Ok(())
}

pub async fn show(
    conns: &Connections,
    auth: &AuthContext,
    target_org: Option<&str>,
    id: &SuiteId,
    ctx: &CallContext,
) -> Result<()> {
    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };
    let suite = service()?
        .read_one(auth, target_org, id, stores, ctx)
        .await
        .with_context(|| format!("reading suite {}", id))?
        .with_context(|| format!("suite {} not found", id))?;
    print_json(&suite)
}

/// Create suites from a JSON array of suite definitions
pub async fn create(
    conns: &Connections,
    auth: &AuthContext,
    target_org: Option<&str>,
    file: &Path,
    ctx: &CallContext,
) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let props: Vec<SuiteProps> =
        serde_json::from_str(&raw).context("parsing suite definitions")?;

    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };
    let ids = service()?
        .create(auth, target_org, props, stores, ctx)
        .await
        .context("creating suites")?;
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

pub async fn delete(
    conns: &Connections,
    auth: &AuthContext,
    target_org: Option<&str>,
    ids: &[SuiteId],
    ctx: &CallContext,
) -> Result<()> {
    let warehouse = conns.warehouse()?;
    let stores = Stores {
        suites: &conns.storage,
        history: &conns.storage,
        warehouse: warehouse.as_ref(),
    };
    service()?
        .delete(auth, target_org, ids, stores, ctx)
        .await
        .context("deleting suites")?;
    println!("Deleted {} suite(s)", ids.len());
    Ok(())
}
