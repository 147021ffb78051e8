//! PostgreSQL database driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy
//! - [`PostgresReader`]: Source database reader (portal-backed row stream)
//! - [`PostgresWriter`]: Target database writer (cached prepared INSERT)
//!
//! Both sides use deadpool-postgres with a single pooled connection and the
//! shared rustls connector from [`crate::drivers::common::tls`].

mod dialect;
mod params;
mod reader;
mod writer;

pub use dialect::PostgresDialect;
pub use reader::PostgresReader;
pub use writer::PostgresWriter;

use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::config::SslMode as PgSslMode;
use tokio_postgres::Config as PgConfig;
use tracing::warn;

use crate::core::schema::ConnectionSpec;
use crate::drivers::common::{SslMode, TlsBuilder, CONNECT_TIMEOUT};
use crate::error::{MigrateError, Result};

/// Build a one-connection pool for `spec` and check it with `SELECT 1`.
async fn connect_pool(spec: &ConnectionSpec) -> Result<Pool> {
    let ssl_mode = SslMode::for_connection(spec)?;

    let mut pg_config = PgConfig::new();
    pg_config
        .host(&spec.host)
        .port(spec.port())
        .dbname(&spec.database)
        .user(&spec.username)
        .password(&spec.password)
        .connect_timeout(CONNECT_TIMEOUT)
        .ssl_mode(match ssl_mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => PgSslMode::Require,
        });

    let mgr_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };

    let mgr = match TlsBuilder::new(ssl_mode).build()? {
        Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        None => {
            warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
            Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
        }
    };

    let pool = Pool::builder(mgr)
        .max_size(1)
        .build()
        .map_err(|e| MigrateError::connection("postgres", e))?;

    let client = pool
        .get()
        .await
        .map_err(|e| MigrateError::connection("postgres", e))?;
    client
        .simple_query("SELECT 1")
        .await
        .map_err(|e| MigrateError::connection("postgres", e))?;

    Ok(pool)
}
