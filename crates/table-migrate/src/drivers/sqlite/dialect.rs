use crate::core::traits::Dialect;

/// SQLite dialect: numbered `?n` placeholders.
#[derive(Debug, Clone, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn param_placeholder(&self, index: usize, _name: &str) -> String {
        format!("?{}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders() {
        let q = SqliteDialect::new().build_insert_query(
            "users",
            &["id".to_string(), "name".to_string()],
            &["usr_id".to_string(), "usr_name".to_string()],
        );
        assert_eq!(q.sql, "INSERT INTO users (id, name) VALUES (?1, ?2)");
    }
}
