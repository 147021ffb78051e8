//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;

use crate::core::schema::{ConnectionSpec, DbEngine, FieldMapping, MigrationPlan, TableMigration};
use crate::error::Result;
use crate::transfer::TransferConfig;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Build the migration plan described by this document.
    pub fn to_plan(&self) -> Result<MigrationPlan> {
        Ok(MigrationPlan {
            from: self.databases.from.to_spec()?,
            to: self.databases.to.to_spec()?,
            tables: self.migrations.iter().map(MigrationConfig::to_table).collect(),
        })
    }

    /// Engine options from the `options` section.
    pub fn transfer_config(&self) -> TransferConfig {
        TransferConfig {
            batch_size: self.options.batch_size,
            max_recorded_failures: self.options.max_recorded_failures,
        }
    }
}

impl DatabaseConfig {
    /// Connection descriptor for this database.
    pub fn to_spec(&self) -> Result<ConnectionSpec> {
        Ok(ConnectionSpec {
            engine: DbEngine::parse(&self.engine)?,
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            ssl_mode: self.ssl_mode.clone(),
        })
    }
}

impl MigrationConfig {
    /// Table migration with its mappings in document order.
    pub fn to_table(&self) -> TableMigration {
        TableMigration::new(
            self.from.name(),
            self.to.name(),
            self.transformations
                .iter()
                .map(|t| FieldMapping::new(t.from.as_str(), t.to.as_str(), t.field_type.as_str()))
                .collect(),
        )
    }
}
