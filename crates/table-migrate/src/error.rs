//! Error types for the migration library.

use thiserror::Error;

/// Exit code for a clean run.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code when a database connection cannot be acquired.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for a run that finished with failed rows or tables.
pub const EXIT_PARTIAL_FAILURE: u8 = 3;
/// Exit code for database errors outside the row loop.
pub const EXIT_DATABASE_ERROR: u8 = 4;
/// Exit code for anything else.
pub const EXIT_OTHER_ERROR: u8 = 5;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;
/// Exit code for a cancelled run (SIGINT convention).
pub const EXIT_CANCELLED: u8 = 130;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad table migration).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A database could not be reached or refused authentication.
    #[error("Connection to {engine} database failed: {message}")]
    Connection { engine: String, message: String },

    /// The SELECT against a source table failed.
    #[error("Extraction failed for table {table}: {message}")]
    Extraction { table: String, message: String },

    /// A single row could not be inserted into the destination.
    #[error("Insert into {table} failed: {message}")]
    RowInsert { table: String, message: String },

    /// A value could not be coerced to its binding kind.
    #[error("Cannot bind field {field}: {message}")]
    Bind { field: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Connection error for the given engine.
    pub fn connection(engine: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            engine: engine.into(),
            message: message.to_string(),
        }
    }

    /// Create an Extraction error.
    pub fn extraction(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Extraction {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a RowInsert error.
    pub fn row_insert(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::RowInsert {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Bind error.
    pub fn bind(field: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Bind {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::Extraction { .. } | MigrateError::RowInsert { .. } => {
                EXIT_DATABASE_ERROR
            }
            MigrateError::Io(_) => EXIT_IO_ERROR,
            MigrateError::Cancelled => EXIT_CANCELLED,
            MigrateError::Bind { .. } | MigrateError::Json(_) => EXIT_OTHER_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
