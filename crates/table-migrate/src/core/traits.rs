//! Core traits for database-agnostic row migration.
//!
//! This module defines the seams the migration engine runs against:
//!
//! - [`SourceReader`]: streams rows out of a source table
//! - [`TargetWriter`]: executes one parameterized INSERT per row
//! - [`Dialect`]: SQL text generation for a database engine
//!
//! # Design Patterns
//!
//! - **Strategy**: Dialect provides interchangeable placeholder syntax
//! - **Template Method**: Default implementations in traits define algorithm skeletons

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::typemap::BoundValue;

use super::value::Batch;

/// A SELECT statement built for one table migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// Source table, as written in the plan.
    pub table: String,
    /// Selected source fields, in mapping order. Rows are keyed by these names.
    pub columns: Vec<String>,
    /// Statement text.
    pub sql: String,
}

/// A parameterized INSERT statement built for one table migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertQuery {
    /// Destination table, as written in the plan.
    pub table: String,
    /// Destination columns, in mapping order.
    pub columns: Vec<String>,
    /// Bind parameter names (the source field names), in mapping order.
    pub params: Vec<String>,
    /// Statement text.
    pub sql: String,
}

/// Read rows from a source database.
///
/// # Streaming
///
/// [`read_table`](SourceReader::read_table) returns a channel receiver. The
/// reader spawns a task that owns the cursor and fills the channel; when the
/// receiver is dropped (table finished, abandoned, or run cancelled) the task
/// stops and the cursor is released.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// SQL dialect of this connection.
    fn dialect(&self) -> &dyn Dialect;

    /// Start streaming the result of `query` in batches of `batch_size` rows.
    ///
    /// A failing SELECT is delivered as an `Err` item, after which the
    /// channel closes.
    fn read_table(&self, query: &SelectQuery, batch_size: usize) -> mpsc::Receiver<Result<Batch>>;

    /// Run a trivial query to check the connection is usable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mysql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write rows to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// SQL dialect of this connection.
    fn dialect(&self) -> &dyn Dialect;

    /// Execute `query` once with `values` bound 1:1 to `query.params`.
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// `MigrateError::RowInsert` when the database rejects the statement or a
    /// bound value.
    async fn insert_row(&self, query: &InsertQuery, values: &[BoundValue]) -> Result<u64>;

    /// Run a trivial query to check the connection is usable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mysql", "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// SQL syntax strategy for different database engines.
///
/// Identifiers are emitted as written; they are validated before any
/// statement is built (see [`crate::core::identifier`]).
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mysql", "postgres").
    fn name(&self) -> &str;

    /// Placeholder for the bind parameter at 1-based `index`, named `name`.
    ///
    /// - MySQL: `?`
    /// - PostgreSQL: `$1`, `$2`, etc.
    /// - SQLite: `?1`, `?2`, etc.
    fn param_placeholder(&self, index: usize, name: &str) -> String;

    /// Build `SELECT <columns> FROM <table>`.
    fn build_select_query(&self, table: &str, columns: &[String]) -> SelectQuery {
        SelectQuery {
            table: table.to_string(),
            columns: columns.to_vec(),
            sql: format!("SELECT {} FROM {}", columns.join(", "), table),
        }
    }

    /// Build `INSERT INTO <table> (<columns>) VALUES (<placeholders>)`.
    fn build_insert_query(&self, table: &str, columns: &[String], params: &[String]) -> InsertQuery {
        let placeholders = params
            .iter()
            .enumerate()
            .map(|(i, name)| self.param_placeholder(i + 1, name))
            .collect::<Vec<_>>()
            .join(", ");
        InsertQuery {
            table: table.to_string(),
            columns: columns.to_vec(),
            params: params.to_vec(),
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NamedDialect;

    impl Dialect for NamedDialect {
        fn name(&self) -> &str {
            "named"
        }

        fn param_placeholder(&self, _index: usize, name: &str) -> String {
            format!(":{}", name)
        }
    }

    #[test]
    fn test_build_select_query() {
        let q = NamedDialect.build_select_query(
            "tbl_users",
            &["usr_id".to_string(), "usr_name".to_string()],
        );
        assert_eq!(q.sql, "SELECT usr_id, usr_name FROM tbl_users");
        assert_eq!(q.columns, vec!["usr_id", "usr_name"]);
    }

    #[test]
    fn test_build_insert_query() {
        let q = NamedDialect.build_insert_query(
            "users",
            &["id".to_string(), "name".to_string()],
            &["usr_id".to_string(), "usr_name".to_string()],
        );
        assert_eq!(q.sql, "INSERT INTO users (id, name) VALUES (:usr_id, :usr_name)");
        assert_eq!(q.params, vec!["usr_id", "usr_name"]);
    }
}
