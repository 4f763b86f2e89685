//! Migrate command

use anyhow::{Context, Result};
use vigil_storage::PostgresStorage;

pub async fn execute(database_url: &str) -> Result<()> {
    let storage = PostgresStorage::new(database_url)
        .await
        .context("connecting to metadata database")?;
    vigil_storage::migrations::run_migrations(storage.pool())
        .await
        .context("applying migrations")?;
    tracing::info!("Migrations applied successfully");
    Ok(())
}
