//! Staleness probe against the warehouse's metadata
//!
//! The probe only ever reads. It runs one query against a metadata relation
//! exposing `table_catalog`, `table_schema`, `table_name` and `last_altered`
//! columns, matching names case-insensitively.

use crate::postgres::map_db_error;
use crate::repository::{ProbeRow, StalenessProbe, WarehouseProbe};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

/// Where warehouse metadata lives
///
/// There is no default: PostgreSQL's own `information_schema.tables` has no
/// `last_altered` column, so the relation always names a warehouse catalog
/// (for example a Snowflake `information_schema.tables` replica) explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Relation queried for `last_altered` timestamps
    pub metadata_relation: String,
}

impl WarehouseConfig {
    pub fn new(metadata_relation: impl Into<String>) -> Self {
        Self {
            metadata_relation: metadata_relation.into(),
        }
    }

    /// The relation is spliced into SQL, so only plain identifiers are allowed
    pub fn validate(&self) -> Result<()> {
        let valid = !self.metadata_relation.is_empty()
            && self.metadata_relation.split('.').all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_')
            });
        if !valid {
            return Err(crate::Error::ValidationError(format!(
                "Invalid metadata relation: {}",
                self.metadata_relation
            )));
        }
        Ok(())
    }

    pub fn staleness_sql(&self) -> String {
        format!(
            "SELECT (last_altered >= NOW() - make_interval(mins => $4)) AS was_altered \
             FROM {} \
             WHERE lower(table_catalog) = lower($1) \
               AND lower(table_schema) = lower($2) \
               AND lower(table_name) = lower($3)",
            self.metadata_relation
        )
    }
}

/// [`WarehouseProbe`] over a caller-owned sqlx pool
pub struct SqlxWarehouseProbe<'p> {
    pool: &'p PgPool,
    config: WarehouseConfig,
}

impl<'p> SqlxWarehouseProbe<'p> {
    pub fn new(pool: &'p PgPool, config: WarehouseConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { pool, config })
    }
}

#[async_trait]
impl WarehouseProbe for SqlxWarehouseProbe<'_> {
    #[instrument(
        skip(self, probe),
        fields(
            db.system = "postgresql",
            db.operation = "SELECT",
            db.sql.table = %self.config.metadata_relation,
            lookback_minutes = probe.lookback_minutes
        )
    )]
    async fn query(&self, probe: &StalenessProbe) -> Result<Vec<ProbeRow>> {
        let minutes = i32::try_from(probe.lookback_minutes).map_err(|_| {
            crate::Error::ValidationError(format!(
                "Lookback of {} minutes is out of range",
                probe.lookback_minutes
            ))
        })?;

        let rows = sqlx::query(&self.config.staleness_sql())
            .bind(&probe.database_name)
            .bind(&probe.schema_name)
            .bind(&probe.materialization_name)
            .bind(minutes)
            .fetch_all(self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(rows.iter().map(probe_row).collect())
    }
}

fn probe_row(row: &PgRow) -> ProbeRow {
    let mut map = ProbeRow::new();
    let value = match row.try_get::<Option<bool>, _>("was_altered") {
        Ok(Some(altered)) => Value::Bool(altered),
        Ok(None) => Value::Null,
        Err(sqlx::Error::ColumnNotFound(_)) => return map,
        Err(_) => row
            .try_get::<String, _>("was_altered")
            .map(Value::String)
            .unwrap_or(Value::Null),
    };
    map.insert("was_altered".to_string(), value);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualified_relations_are_valid() {
        assert!(WarehouseConfig::new("warehouse_meta.tables").validate().is_ok());
        assert!(WarehouseConfig::new("snowflake_meta.account_usage.tables")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_relation_rejects_injection() {
        for relation in ["", "tables; DROP TABLE x", "a..b", "info schema.tables"] {
            let cfg = WarehouseConfig {
                metadata_relation: relation.to_string(),
            };
            assert!(cfg.validate().is_err(), "accepted {:?}", relation);
        }
    }

    #[test]
    fn test_staleness_sql_is_case_insensitive() {
        let sql = WarehouseConfig::new("warehouse_meta.tables").staleness_sql();
        assert!(sql.contains("FROM warehouse_meta.tables"));
        assert!(sql.contains("lower(table_name) = lower($3)"));
        assert!(sql.contains("AS was_altered"));
    }
}
