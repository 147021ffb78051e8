//! Configuration document types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::transfer::{DEFAULT_BATCH_SIZE, DEFAULT_MAX_RECORDED_FAILURES};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source and destination connections.
    pub databases: DatabasesConfig,

    /// Table migrations, run in document order.
    #[serde(default)]
    pub migrations: Vec<MigrationConfig>,

    /// Run options.
    #[serde(default)]
    pub options: OptionsConfig,
}

/// The two connections of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabasesConfig {
    /// Database rows are read from.
    pub from: DatabaseConfig,

    /// Database rows are inserted into.
    pub to: DatabaseConfig,
}

/// One database connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database engine: mysql (default), postgres or sqlite.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Database host. Unused for SQLite.
    #[serde(default)]
    pub host: String,

    /// Database port (default: engine default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Username.
    #[serde(default, alias = "user")]
    pub username: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Database name, or file path for SQLite.
    #[serde(default)]
    pub database: String,

    /// TLS mode (disable, prefer, require, verify-ca, verify-full).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_mode: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// One table migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source table.
    pub from: TableRef,

    /// Destination table.
    pub to: TableRef,

    /// Field mappings, in column order.
    #[serde(default)]
    pub transformations: Vec<TransformationConfig>,
}

/// A table, written either as `users` or as `{ table: users }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableRef {
    Name(String),
    Table { table: String },
}

impl TableRef {
    pub fn name(&self) -> &str {
        match self {
            TableRef::Name(name) | TableRef::Table { table: name } => name,
        }
    }
}

/// One field mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformationConfig {
    /// Source field.
    pub from: String,

    /// Destination field.
    pub to: String,

    /// Type tag: string, int, boolean, blob or clob. Anything else binds as string.
    #[serde(default, rename = "type")]
    pub field_type: String,
}

/// Run options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Rows per batch pulled from the source (default: 1000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Row failures recorded with their message (default: 1000).
    #[serde(default = "default_max_recorded_failures")]
    pub max_recorded_failures: usize,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_recorded_failures: default_max_recorded_failures(),
        }
    }
}

fn default_engine() -> String {
    "mysql".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_max_recorded_failures() -> usize {
    DEFAULT_MAX_RECORDED_FAILURES
}
