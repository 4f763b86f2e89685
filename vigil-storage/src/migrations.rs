//! Database migration support

use crate::Result;
use sqlx::PgPool;
use tracing::info;

/// Apply all pending migrations for the suite and history tables
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| crate::Error::Migration(e.to_string()))?;

    info!("Database migrations applied");
    Ok(())
}
