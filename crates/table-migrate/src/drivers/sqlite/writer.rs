//! SQLite target writer implementation.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::Sqlite;
use tracing::info;

use crate::core::schema::ConnectionSpec;
use crate::core::traits::{Dialect, InsertQuery, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::typemap::{BindingKind, BoundValue};

use super::{connect_pool, SqliteDialect};

/// SQLite target writer.
pub struct SqliteWriter {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteWriter {
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let pool = connect_pool(spec).await?;
        info!("Opened SQLite target: {}", spec.location());
        Ok(Self {
            pool,
            dialect: SqliteDialect::new(),
        })
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind one value, keeping the declared kind for NULL.
fn bind_value<'q>(query: SqliteQuery<'q>, value: &BoundValue) -> SqliteQuery<'q> {
    match value {
        BoundValue::Null(BindingKind::String) => query.bind(None::<String>),
        BoundValue::Null(BindingKind::Int) => query.bind(None::<i64>),
        BoundValue::Null(BindingKind::Boolean) => query.bind(None::<bool>),
        BoundValue::Null(BindingKind::LargeObject) => query.bind(None::<Vec<u8>>),
        BoundValue::Text(s) => query.bind(s.clone()),
        BoundValue::Int(i) => query.bind(*i),
        BoundValue::Bool(b) => query.bind(*b),
        BoundValue::Bytes(b) => query.bind(b.clone()),
    }
}

#[async_trait]
impl TargetWriter for SqliteWriter {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn insert_row(&self, query: &InsertQuery, values: &[BoundValue]) -> Result<u64> {
        let stmt = values
            .iter()
            .fold(sqlx::query(&query.sql), bind_value);

        let done = stmt
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::row_insert(&query.table, e))?;
        Ok(done.rows_affected())
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MigrateError::connection("sqlite", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
