//! Database driver implementations.
//!
//! This module provides database-specific implementations of the core traits:
//!
//! - [`mysql`]: MySQL/MariaDB driver
//! - [`postgres`]: PostgreSQL driver
//! - [`sqlite`]: SQLite driver
//! - [`common`]: Shared utilities (TLS, timeouts)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: placeholder syntax for the database engine
//! - `SourceReader`: streams the rows of a SELECT
//! - `TargetWriter`: executes one parameterized INSERT per row
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `Dialect`, `SourceReader` and `TargetWriter`
//! 3. Add a `DbEngine` variant and an arm in [`DialectImpl`], [`connect_source`]
//!    and [`connect_target`]
//! 4. Gate the driver with a feature flag in `Cargo.toml`

pub mod common;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use common::SslMode;

#[cfg(feature = "mysql")]
pub use mysql::{MysqlDialect, MysqlReader, MysqlWriter};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresDialect, PostgresReader, PostgresWriter};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDialect, SqliteReader, SqliteWriter};

use crate::core::schema::{ConnectionSpec, DbEngine};
use crate::core::traits::{Dialect, SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};

/// Enum-based static dispatch for dialects.
///
/// Used where SQL has to be built without a connection (dry runs).
#[derive(Debug, Clone)]
pub enum DialectImpl {
    #[cfg(feature = "mysql")]
    Mysql(MysqlDialect),
    #[cfg(feature = "postgres")]
    Postgres(PostgresDialect),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteDialect),
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            #[cfg(feature = "mysql")]
            DialectImpl::Mysql(d) => d.name(),
            #[cfg(feature = "postgres")]
            DialectImpl::Postgres(d) => d.name(),
            #[cfg(feature = "sqlite")]
            DialectImpl::Sqlite(d) => d.name(),
        }
    }

    fn param_placeholder(&self, index: usize, name: &str) -> String {
        match self {
            #[cfg(feature = "mysql")]
            DialectImpl::Mysql(d) => d.param_placeholder(index, name),
            #[cfg(feature = "postgres")]
            DialectImpl::Postgres(d) => d.param_placeholder(index, name),
            #[cfg(feature = "sqlite")]
            DialectImpl::Sqlite(d) => d.param_placeholder(index, name),
        }
    }
}

impl DialectImpl {
    /// Dialect for `engine`.
    ///
    /// # Errors
    ///
    /// Returns a config error if the engine's driver was compiled out.
    pub fn for_engine(engine: DbEngine) -> Result<Self> {
        match engine {
            #[cfg(feature = "mysql")]
            DbEngine::Mysql => Ok(DialectImpl::Mysql(MysqlDialect::new())),
            #[cfg(feature = "postgres")]
            DbEngine::Postgres => Ok(DialectImpl::Postgres(PostgresDialect::new())),
            #[cfg(feature = "sqlite")]
            DbEngine::Sqlite => Ok(DialectImpl::Sqlite(SqliteDialect::new())),
            #[allow(unreachable_patterns)]
            other => Err(not_compiled(other)),
        }
    }
}

/// Open a reader on the source described by `spec`.
///
/// # Errors
///
/// `MigrateError::Connection` when the database cannot be reached.
pub async fn connect_source(spec: &ConnectionSpec) -> Result<Box<dyn SourceReader>> {
    match spec.engine {
        #[cfg(feature = "mysql")]
        DbEngine::Mysql => Ok(Box::new(MysqlReader::connect(spec).await?)),
        #[cfg(feature = "postgres")]
        DbEngine::Postgres => Ok(Box::new(PostgresReader::connect(spec).await?)),
        #[cfg(feature = "sqlite")]
        DbEngine::Sqlite => Ok(Box::new(SqliteReader::connect(spec).await?)),
        #[allow(unreachable_patterns)]
        other => Err(not_compiled(other)),
    }
}

/// Open a writer on the destination described by `spec`.
///
/// # Errors
///
/// `MigrateError::Connection` when the database cannot be reached.
pub async fn connect_target(spec: &ConnectionSpec) -> Result<Box<dyn TargetWriter>> {
    match spec.engine {
        #[cfg(feature = "mysql")]
        DbEngine::Mysql => Ok(Box::new(MysqlWriter::connect(spec).await?)),
        #[cfg(feature = "postgres")]
        DbEngine::Postgres => Ok(Box::new(PostgresWriter::connect(spec).await?)),
        #[cfg(feature = "sqlite")]
        DbEngine::Sqlite => Ok(Box::new(SqliteWriter::connect(spec).await?)),
        #[allow(unreachable_patterns)]
        other => Err(not_compiled(other)),
    }
}

#[allow(dead_code)]
fn not_compiled(engine: DbEngine) -> MigrateError {
    MigrateError::Config(format!(
        "Database engine '{}' is not supported by this build (enable the '{}' feature)",
        engine, engine
    ))
}
