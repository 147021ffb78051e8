//! Common utilities shared across database drivers.
//!
//! - [`tls`]: SSL mode parsing and the rustls connector for PostgreSQL

pub mod tls;

pub use tls::SslMode;
#[cfg(feature = "postgres")]
pub use tls::TlsBuilder;

/// Timeout for acquiring a pooled connection.
pub const CONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Channel depth between a reader task and the engine, in batches.
pub const READ_AHEAD_BATCHES: usize = 4;
