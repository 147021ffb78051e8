//! # table-migrate
//!
//! Row migration between relational databases.
//!
//! A run copies the rows of each configured source table into a destination
//! table, renaming fields and coercing values to a declared type tag on the
//! way:
//!
//! - **Field mappings** rename `source_field` to `target_field` per table
//! - **Type tags** (`string`, `int`, `boolean`, `blob`, `clob`) pick how each
//!   value is bound to the destination
//! - **Row isolation**: a rejected row is counted and the run moves on
//! - **Table isolation**: a table that cannot be read is abandoned, the
//!   others still run
//! - **Drivers** for MySQL/MariaDB, PostgreSQL and SQLite on either side
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> table_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::from_config(&config)?;
//!     let result = orchestrator.run(&CancellationToken::new()).await?;
//!     println!("{} rows successfully migrated", result.success_count);
//!     println!("{} rows failed to migrate", result.fail_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, MigrationConfig, OptionsConfig};
pub use core::{ConnectionSpec, DbEngine, FieldMapping, FieldType, MigrationPlan, TableMigration};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, Orchestrator, PlannedTable};
pub use transfer::{
    ResultTracker, RowFailure, RunResult, TableOutcome, TableStatus, TransferConfig,
    TransferEngine, TransferJob,
};
pub use typemap::{BindingKind, BoundValue};
