//! Configuration validation.
//!
//! Only document-level problems are rejected here. A malformed table migration
//! (no mappings, duplicate source field, bad identifier) is left for the engine
//! so that just that table is skipped.

use super::{Config, DatabaseConfig};
use crate::core::schema::DbEngine;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_database("databases.from", &config.databases.from)?;
    validate_database("databases.to", &config.databases.to)?;

    if config.migrations.is_empty() {
        return Err(MigrateError::Config(
            "migrations must list at least one table migration".into(),
        ));
    }

    for (i, migration) in config.migrations.iter().enumerate() {
        if migration.from.name().trim().is_empty() || migration.to.name().trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "migrations[{}]: from and to tables are required",
                i
            )));
        }
    }

    if config.options.batch_size == 0 {
        return Err(MigrateError::Config(
            "options.batch_size must be at least 1".into(),
        ));
    }

    Ok(())
}

fn validate_database(path: &str, db: &DatabaseConfig) -> Result<()> {
    let engine = DbEngine::parse(&db.engine)
        .map_err(|_| MigrateError::Config(format!("{}.engine: unknown engine '{}'", path, db.engine)))?;

    if engine.is_networked() && db.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", path)));
    }
    if db.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", path)));
    }
    if let Some(ssl_mode) = &db.ssl_mode {
        crate::drivers::SslMode::parse(ssl_mode)
            .map_err(|e| MigrateError::Config(format!("{}.ssl_mode: {}", path, e)))?;
    }

    Ok(())
}
