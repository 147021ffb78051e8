//! Migration schema model: what to migrate and how.
//!
//! These are passive, immutable-after-construction types. A [`MigrationPlan`]
//! is built once by the configuration layer (or by hand in tests) and handed
//! to the engine, which never mutates it.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::identifier::{validate_field_name, validate_table_name};
use crate::error::{MigrateError, Result};

/// Supported database engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DbEngine {
    /// MySQL / MariaDB.
    #[default]
    Mysql,
    /// PostgreSQL.
    Postgres,
    /// SQLite database file.
    Sqlite,
}

impl DbEngine {
    /// Parse an engine name. Accepts common aliases.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DbEngine::Mysql),
            "postgres" | "postgresql" | "pg" => Ok(DbEngine::Postgres),
            "sqlite" | "sqlite3" => Ok(DbEngine::Sqlite),
            other => Err(MigrateError::Config(format!(
                "Unknown database engine: '{}'. Supported engines: mysql, postgres, sqlite",
                other
            ))),
        }
    }

    /// Canonical engine name.
    pub fn as_str(&self) -> &'static str {
        match self {
            DbEngine::Mysql => "mysql",
            DbEngine::Postgres => "postgres",
            DbEngine::Sqlite => "sqlite",
        }
    }

    /// Default TCP port, if the engine uses one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            DbEngine::Mysql => Some(3306),
            DbEngine::Postgres => Some(5432),
            DbEngine::Sqlite => None,
        }
    }

    /// Whether the engine talks to a server (needs host and credentials).
    pub fn is_networked(&self) -> bool {
        !matches!(self, DbEngine::Sqlite)
    }
}

impl TryFrom<String> for DbEngine {
    type Error = MigrateError;

    fn try_from(value: String) -> Result<Self> {
        DbEngine::parse(&value)
    }
}

impl From<DbEngine> for String {
    fn from(engine: DbEngine) -> Self {
        engine.as_str().to_string()
    }
}

impl fmt::Display for DbEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection descriptor for one side of a run.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    /// Database engine.
    pub engine: DbEngine,
    /// Server host name. Unused for SQLite.
    pub host: String,
    /// Server port. `None` means the engine default.
    pub port: Option<u16>,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Database name, or the file path for SQLite.
    pub database: String,
    /// TLS mode (`disable`, `prefer`, `require`, `verify-ca`, `verify-full`).
    /// `None` means the engine default.
    pub ssl_mode: Option<String>,
}

impl ConnectionSpec {
    /// Effective port: explicit value or the engine default.
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| self.engine.default_port())
            .unwrap_or_default()
    }

    /// Human-readable location without credentials, for logs.
    pub fn location(&self) -> String {
        if self.engine.is_networked() {
            format!("{}://{}:{}/{}", self.engine, self.host, self.port(), self.database)
        } else {
            format!("{}://{}", self.engine, self.database)
        }
    }
}

// Manual Debug so the password never reaches logs.
impl fmt::Debug for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSpec")
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

/// Semantic type tag of a field mapping, as written in the document.
///
/// Tags are matched case-insensitively. Anything unrecognised is kept
/// verbatim as [`FieldType::Other`]; it binds as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    #[default]
    String,
    Int,
    Boolean,
    Blob,
    Clob,
    Other(String),
}

impl FieldType {
    /// Parse a type tag. Never fails.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "string" | "" => FieldType::String,
            "int" | "integer" => FieldType::Int,
            "boolean" | "bool" => FieldType::Boolean,
            "blob" => FieldType::Blob,
            "clob" => FieldType::Clob,
            other => FieldType::Other(other.to_string()),
        }
    }

    /// The tag as written in documents.
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Boolean => "boolean",
            FieldType::Blob => "blob",
            FieldType::Clob => "clob",
            FieldType::Other(tag) => tag,
        }
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        FieldType::parse(&value)
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        FieldType::parse(value)
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

/// One source column → one destination column, with a type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Column selected from the source table; also the bind parameter name.
    pub source_field: String,
    /// Column inserted into the destination table.
    pub target_field: String,
    /// Semantic type tag.
    pub field_type: FieldType,
}

impl FieldMapping {
    pub fn new(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        field_type: impl Into<FieldType>,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            field_type: field_type.into(),
        }
    }
}

/// One source-table-to-destination-table unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableMigration {
    pub source_table: String,
    pub target_table: String,
    /// Ordered mappings; the order fixes column order in generated SQL.
    pub field_mappings: Vec<FieldMapping>,
}

impl TableMigration {
    pub fn new(
        source_table: impl Into<String>,
        target_table: impl Into<String>,
        field_mappings: Vec<FieldMapping>,
    ) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            field_mappings,
        }
    }

    /// Display label used in logs and results.
    pub fn label(&self) -> String {
        format!("{} -> {}", self.source_table, self.target_table)
    }

    /// Source field names in mapping order.
    pub fn source_fields(&self) -> Vec<String> {
        self.field_mappings
            .iter()
            .map(|m| m.source_field.clone())
            .collect()
    }

    /// Target field names in mapping order.
    pub fn target_fields(&self) -> Vec<String> {
        self.field_mappings
            .iter()
            .map(|m| m.target_field.clone())
            .collect()
    }

    /// Check the table migration before any query runs.
    ///
    /// # Errors
    ///
    /// `MigrateError::Config` when there are no field mappings, a source field
    /// repeats, or a table/field name is not a valid identifier.
    pub fn validate(&self) -> Result<()> {
        let label = self.label();
        let in_table = |e: MigrateError| MigrateError::Config(format!("{}: {}", label, strip(e)));

        validate_table_name(&self.source_table).map_err(in_table)?;
        validate_table_name(&self.target_table).map_err(in_table)?;

        if self.field_mappings.is_empty() {
            return Err(MigrateError::Config(format!(
                "{}: table migration has no field mappings",
                label
            )));
        }

        let mut seen = HashSet::new();
        for mapping in &self.field_mappings {
            validate_field_name(&mapping.source_field).map_err(in_table)?;
            validate_field_name(&mapping.target_field).map_err(in_table)?;
            if !seen.insert(mapping.source_field.as_str()) {
                return Err(MigrateError::Config(format!(
                    "{}: source field '{}' is mapped more than once",
                    label, mapping.source_field
                )));
            }
        }

        Ok(())
    }
}

/// Unwrap the message of a Config error so it can be re-prefixed.
fn strip(err: MigrateError) -> String {
    match err {
        MigrateError::Config(msg) => msg,
        other => other.to_string(),
    }
}

/// The full, immutable description of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationPlan {
    /// Source connection.
    pub from: ConnectionSpec,
    /// Destination connection.
    pub to: ConnectionSpec,
    /// Table migrations, processed in this order.
    pub tables: Vec<TableMigration>,
}

impl MigrationPlan {
    /// One line per table migration, for logging and dry runs.
    pub fn summary(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| format!("{} ({} fields)", t.label(), t.field_mappings.len()))
            .collect()
    }
}
