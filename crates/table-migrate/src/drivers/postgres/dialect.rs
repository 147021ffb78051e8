//! PostgreSQL SQL dialect.

use crate::core::traits::Dialect;

/// PostgreSQL dialect: positional `$n` placeholders.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn param_placeholder(&self, index: usize, _name: &str) -> String {
        format!("${}", index)
    }
}
