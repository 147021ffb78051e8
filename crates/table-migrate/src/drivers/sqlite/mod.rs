//! SQLite database driver.
//!
//! `database` in the connection spec is the file path; host, port and
//! credentials are ignored. SQLx backs both sides.

mod dialect;
mod reader;
mod writer;

pub use dialect::SqliteDialect;
pub use reader::SqliteReader;
pub use writer::SqliteWriter;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::core::schema::ConnectionSpec;
use crate::drivers::common::CONNECT_TIMEOUT;
use crate::error::{MigrateError, Result};

/// Open a one-connection pool on an existing database file.
async fn connect_pool(spec: &ConnectionSpec) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(&spec.database)
        .create_if_missing(false);

    SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(options)
        .await
        .map_err(|e| MigrateError::connection("sqlite", e))
}
