//! MySQL/MariaDB source reader implementation.
//!
//! Implements the `SourceReader` trait for reading data from MySQL/MariaDB databases.
//! Uses SQLx for the connection and a streaming cursor per table.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::{Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::schema::ConnectionSpec;
use crate::core::traits::{Dialect, SelectQuery, SourceReader};
use crate::core::value::{Batch, SourceRow, SqlValue};
use crate::drivers::common::{SslMode, CONNECT_TIMEOUT, READ_AHEAD_BATCHES};
use crate::error::{MigrateError, Result};

use super::MysqlDialect;

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
    dialect: MysqlDialect,
}

impl MysqlReader {
    /// Connect to the source database described by `spec`.
    ///
    /// The pool holds a single connection: tables are read one at a time.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let ssl_mode = SslMode::for_connection(spec)?;
        if ssl_mode == SslMode::Disable {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let options = MySqlConnectOptions::new()
            .host(&spec.host)
            .port(spec.port())
            .database(&spec.database)
            .username(&spec.username)
            .password(&spec.password)
            .ssl_mode(sqlx_ssl_mode(ssl_mode));

        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection("mysql", e))?;

        info!("Connected to MySQL source: {}", spec.location());

        Ok(Self {
            pool,
            dialect: MysqlDialect::new(),
        })
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
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
            .map_err(|e| MigrateError::connection("mysql", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

async fn stream_rows(
    pool: MySqlPool,
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
                debug!(table = %query.table, "Receiver dropped, closing cursor");
                return Ok(());
            }
        }
    }

    if !batch.is_empty() {
        let _ = tx.send(Ok(Batch::new(batch))).await;
    }
    Ok(())
}

/// How a column is read, chosen from the server-reported type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnDecode {
    Bool,
    Int,
    Unsigned,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    /// BIT(n): big-endian bytes folded into an integer.
    Bit,
    /// YEAR: sent as a plain integer.
    Year,
    Bytes,
    /// JSON, ENUM, SET, character types and anything newer.
    Text,
}

fn column_decode(type_name: &str) -> ColumnDecode {
    match type_name {
        "BOOLEAN" => ColumnDecode::Bool,
        "BIT" => ColumnDecode::Bit,
        "YEAR" => ColumnDecode::Year,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => ColumnDecode::Int,
        t if t.ends_with("UNSIGNED") => ColumnDecode::Unsigned,
        "FLOAT" => ColumnDecode::Float,
        "DOUBLE" => ColumnDecode::Double,
        "DECIMAL" => ColumnDecode::Decimal,
        "DATE" => ColumnDecode::Date,
        "TIME" => ColumnDecode::Time,
        "DATETIME" | "TIMESTAMP" => ColumnDecode::DateTime,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "GEOMETRY" => {
            ColumnDecode::Bytes
        }
        _ => ColumnDecode::Text,
    }
}

/// Fold a BIT payload (big-endian, at most 8 bytes) into an integer.
fn bit_value(bytes: &[u8]) -> SqlValue {
    if bytes.len() > 8 {
        return SqlValue::Bytes(bytes.to_vec());
    }
    let v = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    i64::try_from(v)
        .map(SqlValue::Int)
        .unwrap_or_else(|_| SqlValue::Decimal(rust_decimal::Decimal::from(v)))
}

/// Raw column payload as text when it is UTF-8, bytes otherwise.
fn raw_text(bytes: Vec<u8>) -> SqlValue {
    match String::from_utf8(bytes) {
        Ok(s) => SqlValue::Text(s),
        Err(e) => SqlValue::Bytes(e.into_bytes()),
    }
}

/// Decode one column by the server-reported type.
///
/// Types sqlx has no checked mapping for (BIT, YEAR, JSON, GEOMETRY, and
/// whatever else the server sends) are read from their raw payload.
fn decode_value(row: &MySqlRow, idx: usize) -> std::result::Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let decode = column_decode(&raw.type_info().name().to_uppercase());

    let value = match decode {
        ColumnDecode::Bool => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
        ColumnDecode::Int => SqlValue::Int(row.try_get::<i64, _>(idx)?),
        ColumnDecode::Unsigned => {
            let v = row.try_get::<u64, _>(idx)?;
            i64::try_from(v)
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Decimal(rust_decimal::Decimal::from(v)))
        }
        ColumnDecode::Float => SqlValue::Float(f64::from(row.try_get::<f32, _>(idx)?)),
        ColumnDecode::Double => SqlValue::Float(row.try_get::<f64, _>(idx)?),
        ColumnDecode::Decimal => SqlValue::Decimal(row.try_get::<rust_decimal::Decimal, _>(idx)?),
        ColumnDecode::Date => SqlValue::Date(row.try_get::<chrono::NaiveDate, _>(idx)?),
        ColumnDecode::Time => SqlValue::Time(row.try_get::<chrono::NaiveTime, _>(idx)?),
        ColumnDecode::DateTime => {
            SqlValue::DateTime(row.try_get::<chrono::NaiveDateTime, _>(idx)?)
        }
        ColumnDecode::Bit => bit_value(&row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        ColumnDecode::Year => SqlValue::Int(i64::from(row.try_get_unchecked::<u16, _>(idx)?)),
        ColumnDecode::Bytes => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        ColumnDecode::Text => raw_text(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
    };
    Ok(value)
}

fn sqlx_ssl_mode(mode: SslMode) -> MySqlSslMode {
    match mode {
        SslMode::Disable => MySqlSslMode::Disabled,
        SslMode::Prefer => MySqlSslMode::Preferred,
        SslMode::Require => MySqlSslMode::Required,
        SslMode::VerifyCa => MySqlSslMode::VerifyCa,
        SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
    }
}
