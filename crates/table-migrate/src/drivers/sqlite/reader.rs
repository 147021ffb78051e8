//! SQLite source reader implementation.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::schema::ConnectionSpec;
use crate::core::traits::{Dialect, SelectQuery, SourceReader};
use crate::core::value::{Batch, SourceRow, SqlValue};
use crate::drivers::common::READ_AHEAD_BATCHES;
use crate::error::{MigrateError, Result};

use super::{connect_pool, SqliteDialect};

/// SQLite source reader.
pub struct SqliteReader {
    pool: SqlitePool,
    dialect: SqliteDialect,
}

impl SqliteReader {
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let pool = connect_pool(spec).await?;
        info!("Opened SQLite source: {}", spec.location());
        Ok(Self {
            pool,
            dialect: SqliteDialect::new(),
        })
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn read_table(&self, query: &SelectQuery, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(READ_AHEAD_BATCHES);
        let pool = self.pool.clone();
        let query = query.clone();

        tokio::spawn(async move {
            if let Err(e) = stream_rows(pool, &query, batch_size, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
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

async fn stream_rows(
    pool: SqlitePool,
    query: &SelectQuery,
    batch_size: usize,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let columns: Arc<[String]> = query.columns.clone().into();
    let mut rows = sqlx::query(&query.sql).fetch(&pool);
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(row) = rows
        .try_next()
        .await
        .map_err(|e| MigrateError::extraction(&query.table, e))?
    {
        let values = (0..columns.len())
            .map(|i| decode_value(&row, i))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MigrateError::extraction(&query.table, e))?;
        batch.push(SourceRow::new(columns.clone(), values));

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            if tx.send(Ok(Batch::new(full))).await.is_err() {
                debug!(table = %query.table, "Receiver dropped, finalizing statement");
                return Ok(());
            }
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(Ok(Batch::new(batch))).await;
    }
    Ok(())
}

/// Decode by the value's storage class; declared column types are advisory
/// in SQLite.
fn decode_value(row: &SqliteRow, idx: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_uppercase();

    let value = match type_name.as_str() {
        "INTEGER" | "BIGINT" | "INT8" | "BOOLEAN" => SqlValue::Int(row.try_get::<i64, _>(idx)?),
        "REAL" => SqlValue::Float(row.try_get::<f64, _>(idx)?),
        "BLOB" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        _ => SqlValue::Text(row.try_get::<String, _>(idx)?),
    };
    Ok(value)
}
