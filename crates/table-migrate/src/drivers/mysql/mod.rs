//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: SQL syntax strategy
//! - [`MysqlReader`]: Source database reader (SQLx, streaming cursor)
//! - [`MysqlWriter`]: Target database writer (mysql_async, positional parameters)
//!
//! # Feature Flag
//!
//! This module is only available when the `mysql` feature is enabled
//! (on by default).
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+

mod dialect;
mod reader;
mod writer;

pub use dialect::MysqlDialect;
pub use reader::MysqlReader;
pub use writer::MysqlWriter;
