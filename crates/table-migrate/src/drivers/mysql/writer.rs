//! MySQL/MariaDB target writer implementation.
//!
//! Uses mysql_async. Values are bound positionally to the `?` markers
//! produced by [`MysqlDialect`], in mapping order.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts, SslOpts};
use tracing::{info, warn};

use crate::core::schema::ConnectionSpec;
use crate::core::traits::{Dialect, InsertQuery, TargetWriter};
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};
use crate::typemap::BoundValue;

use super::MysqlDialect;

/// MySQL target writer implementation using mysql_async.
pub struct MysqlWriter {
    pool: Pool,
    dialect: MysqlDialect,
}

impl MysqlWriter {
    /// Connect to the destination database described by `spec`.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Self> {
        let ssl_opts = match SslMode::for_connection(spec)? {
            SslMode::Disable => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            SslMode::Prefer | SslMode::Require => {
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
            SslMode::VerifyCa => {
                Some(SslOpts::default().with_danger_skip_domain_validation(true))
            }
            SslMode::VerifyFull => Some(SslOpts::default()),
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&spec.host)
            .tcp_port(spec.port())
            .db_name(Some(&spec.database))
            .user(Some(&spec.username))
            .pass(Some(&spec.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(0, 1)
            .ok_or_else(|| MigrateError::Config("invalid MySQL pool constraints".into()))?;
        let opts: Opts = builder
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        // Fail fast on bad credentials instead of failing every row.
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection("mysql", e))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("mysql", e))?;
        drop(conn);

        info!("Connected to MySQL target: {}", spec.location());

        Ok(Self {
            pool,
            dialect: MysqlDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    async fn insert_row(&self, query: &InsertQuery, values: &[BoundValue]) -> Result<u64> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::row_insert(&query.table, e))?;

        conn.exec_drop(query.sql.as_str(), positional_params(values))
            .await
            .map_err(|e| MigrateError::row_insert(&query.table, e))?;

        Ok(conn.affected_rows())
    }

    async fn test_connection(&self) -> Result<()> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection("mysql", e))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("mysql", e))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        if let Err(e) = self.pool.clone().disconnect().await {
            warn!("Error closing MySQL target pool: {}", e);
        }
    }
}

fn positional_params(values: &[BoundValue]) -> Params {
    if values.is_empty() {
        return Params::Empty;
    }
    Params::Positional(values.iter().map(to_mysql).collect())
}

fn to_mysql(value: &BoundValue) -> mysql_async::Value {
    match value {
        BoundValue::Null(_) => mysql_async::Value::NULL,
        BoundValue::Text(s) => mysql_async::Value::from(s.as_str()),
        BoundValue::Int(i) => mysql_async::Value::from(*i),
        BoundValue::Bool(b) => mysql_async::Value::from(*b),
        BoundValue::Bytes(b) => mysql_async::Value::from(b.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typemap::BindingKind;

    #[test]
    fn test_params_follow_mapping_order() {
        let params = positional_params(&[
            BoundValue::Int(7),
            BoundValue::Null(BindingKind::String),
            BoundValue::Text("ada".into()),
        ]);
        let Params::Positional(values) = params else {
            panic!("expected positional params");
        };
        assert_eq!(
            values,
            vec![
                mysql_async::Value::Int(7),
                mysql_async::Value::NULL,
                mysql_async::Value::Bytes(b"ada".to_vec()),
            ]
        );
    }

    #[test]
    fn test_mixed_case_fields_bind_every_marker() {
        use crate::core::schema::{FieldMapping, TableMigration};
        use crate::transfer::TransferJob;

        let table = TableMigration::new(
            "tbl_users",
            "users",
            vec![
                FieldMapping::new("usrId", "id", "int"),
                FieldMapping::new("usr_name", "name", "string"),
            ],
        );
        let dialect = MysqlDialect::new();
        let job = TransferJob::prepare(&table, &dialect, &dialect).unwrap();
        assert_eq!(job.insert.sql, "INSERT INTO users (id, name) VALUES (?, ?)");

        let params = positional_params(&[BoundValue::Int(1), BoundValue::Text("ada".into())]);
        let Params::Positional(values) = params else {
            panic!("expected positional params");
        };
        assert_eq!(values.len(), job.insert.sql.matches('?').count());
    }

    #[test]
    fn test_bool_binds_as_integer() {
        assert_eq!(to_mysql(&BoundValue::Bool(true)), mysql_async::Value::Int(1));
    }
}
