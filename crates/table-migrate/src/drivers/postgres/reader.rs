//! PostgreSQL source reader implementation.

use std::pin::pin;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::Pool;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::Row;
use tracing::{debug, info};

use crate::core::schema::ConnectionSpec;
use crate::core::traits::{Dialect, SelectQuery, SourceReader};
use crate::core::value::{Batch, SourceRow, SqlValue};
use crate::drivers::common::READ_AHEAD_BATCHES;
use crate::error::{MigrateError, Result};

use super::{connect_pool, PostgresDialect};

/// PostgreSQL source reader implementation.
pub struct PostgresReader {
    pool: Pool,
    dialect: PostgresDialect,
}

impl PostgresReader {
    /// Connect to the source database described by `spec`.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let pool = connect_pool(spec).await?;
        info!("Connected to PostgreSQL source: {}", spec.location());
        Ok(Self {
            pool,
            dialect: PostgresDialect::new(),
        })
    }
}

#[async_trait]
impl SourceReader for PostgresReader {
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

async fn stream_rows(
    pool: Pool,
    query: &SelectQuery,
    batch_size: usize,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    let extraction = |e: tokio_postgres::Error| MigrateError::extraction(&query.table, e);

    let client = pool
        .get()
        .await
        .map_err(|e| MigrateError::extraction(&query.table, e))?;
    let rows = client
        .query_raw(query.sql.as_str(), std::iter::empty::<&(dyn ToSql + Sync)>())
        .await
        .map_err(extraction)?;
    let mut rows = pin!(rows);

    let columns: Arc<[String]> = query.columns.clone().into();
    let mut batch = Vec::with_capacity(batch_size);

    while let Some(row) = rows.try_next().await.map_err(extraction)? {
        let values = (0..columns.len())
            .map(|i| decode_value(&row, i))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(extraction)?;
        batch.push(SourceRow::new(columns.clone(), values));

        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
            if tx.send(Ok(Batch::new(full))).await.is_err() {
                debug!(table = %query.table, "Receiver dropped, closing portal");
                return Ok(());
            }
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(Ok(Batch::new(batch))).await;
    }
    Ok(())
}

/// Convert a PostgreSQL row value to SqlValue by its column type.
fn decode_value(row: &Row, idx: usize) -> std::result::Result<SqlValue, tokio_postgres::Error> {
    let type_name = row.columns()[idx].type_().name().to_string();

    let value = match type_name.as_str() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        "int2" => row
            .try_get::<_, Option<i16>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "int4" => row
            .try_get::<_, Option<i32>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::Int),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| SqlValue::Int(i64::from(v))),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| SqlValue::Float(f64::from(v))),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Float),
        "numeric" => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)?
            .map(SqlValue::Decimal),
        "uuid" => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(SqlValue::Uuid),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
            .map(SqlValue::DateTimeOffset),
        "date" => row
            .try_get::<_, Option<chrono::NaiveDate>>(idx)?
            .map(SqlValue::Date),
        "time" => row
            .try_get::<_, Option<chrono::NaiveTime>>(idx)?
            .map(SqlValue::Time),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| SqlValue::Text(v.to_string())),
        _ if <String as FromSql>::accepts(row.columns()[idx].type_()) => {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        }
        // Enums, domains over text and other types without a Rust mapping.
        _ => row
            .try_get::<_, Option<RawPayload>>(idx)?
            .map(|raw| raw.into_value()),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

/// The column payload as sent by the server, for any type.
#[derive(Debug)]
struct RawPayload(Vec<u8>);

impl RawPayload {
    /// Enum labels are sent as UTF-8 text; other payloads stay bytes.
    fn into_value(self) -> SqlValue {
        match String::from_utf8(self.0) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        }
    }
}

impl<'a> FromSql<'a> for RawPayload {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(RawPayload(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}
