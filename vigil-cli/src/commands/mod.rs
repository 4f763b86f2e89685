//! CLI command implementations

pub mod feedback;
pub mod migrate;
pub mod results;
pub mod suites;
pub mod trigger;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use vigil_storage::{
    PostgresStorage, ProbeRow, SqlxWarehouseProbe, StalenessProbe, WarehouseConfig,
    WarehouseProbe,
};

const MISSING_RELATION: &str =
    "warehouse metadata relation not set (--metadata-relation or VIGIL_WAREHOUSE_METADATA_RELATION)";

/// Stands in for the warehouse when no metadata relation is configured
///
/// Commands that never probe keep working; a staleness check fails with a
/// configuration error instead of querying a relation that lacks `last_altered`.
struct UnconfiguredWarehouse;

#[async_trait]
impl WarehouseProbe for UnconfiguredWarehouse {
    async fn query(&self, _probe: &StalenessProbe) -> vigil_storage::Result<Vec<ProbeRow>> {
        Err(vigil_storage::Error::ValidationError(
            MISSING_RELATION.to_string(),
        ))
    }
}

/// Pools one command runs against; dropped when the command returns
pub struct Connections {
    pub storage: PostgresStorage,
    warehouse_pool: PgPool,
    warehouse_config: Option<WarehouseConfig>,
}

impl Connections {
    /// Connect to the metadata database and the warehouse
    ///
    /// Without a warehouse URL the metadata database doubles as the warehouse.
    pub async fn open(
        database_url: &str,
        warehouse_url: Option<&str>,
        warehouse_config: Option<WarehouseConfig>,
    ) -> Result<Self> {
        let storage = PostgresStorage::new(database_url)
            .await
            .context("connecting to metadata database")?;
        let warehouse_pool = match warehouse_url {
            Some(url) => PgPool::connect(url)
                .await
                .context("connecting to warehouse")?,
            None => storage.pool().clone(),
        };
        Ok(Self {
            storage,
            warehouse_pool,
            warehouse_config,
        })
    }

    pub fn warehouse(&self) -> Result<Box<dyn WarehouseProbe + '_>> {
        match &self.warehouse_config {
            Some(config) => {
                let probe = SqlxWarehouseProbe::new(&self.warehouse_pool, config.clone())
                    .context("invalid warehouse configuration")?;
                Ok(Box::new(probe))
            }
            None => {
                tracing::debug!("No warehouse metadata relation configured");
                Ok(Box::new(UnconfiguredWarehouse))
            }
        }
    }
}

/// Print `value` as pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
