//! PostgreSQL target writer implementation.

use async_trait::async_trait;
use deadpool_postgres::Pool;
use tokio_postgres::types::ToSql;
use tracing::info;

use crate::core::schema::ConnectionSpec;
use crate::core::traits::{Dialect, InsertQuery, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::typemap::BoundValue;

use super::params::PgParam;
use super::{connect_pool, PostgresDialect};

/// PostgreSQL target writer.
///
/// Each INSERT is prepared once per connection (deadpool's statement cache)
/// and executed per row with parameters encoded against the prepared
/// statement's parameter types.
pub struct PostgresWriter {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresWriter {
    /// Connect to the destination database described by `spec`.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let pool = connect_pool(spec).await?;
        info!("Connected to PostgreSQL target: {}", spec.location());
        Ok(Self {
            pool,
            dialect: PostgresDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn insert_row(&self, query: &InsertQuery, values: &[BoundValue]) -> Result<u64> {
        let failed = |e: tokio_postgres::Error| MigrateError::row_insert(&query.table, e);

        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::row_insert(&query.table, e))?;
        let stmt = client.prepare_cached(&query.sql).await.map_err(failed)?;

        let params = values
            .iter()
            .zip(&query.params)
            .zip(stmt.params())
            .map(|((value, name), ty)| PgParam::encode(name, value, ty))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        client.execute(&stmt, &refs).await.map_err(failed)
    }

    async fn test_connection(&self) -> Result<()> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("postgres", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        self.pool.close();
    }
}
