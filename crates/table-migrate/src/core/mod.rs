//! Core abstractions for database-agnostic migration.
//!
//! - [`schema`]: the migration plan model (connections, tables, field mappings)
//! - [`value`]: SQL values, source rows and row batches
//! - [`traits`]: reader, writer and dialect seams the engine runs against
//! - [`identifier`]: identifier validation for generated SQL
//!
//! Nothing in this module performs I/O; driver modules under `drivers/`
//! implement the traits for concrete databases.

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ConnectionSpec, DbEngine, FieldMapping, FieldType, MigrationPlan, TableMigration};
pub use traits::{Dialect, InsertQuery, SelectQuery, SourceReader, TargetWriter};
pub use value::{Batch, SourceRow, SqlValue};
