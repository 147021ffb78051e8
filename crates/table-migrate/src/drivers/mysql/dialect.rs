//! MySQL/MariaDB SQL dialect (Strategy pattern).

use crate::core::traits::Dialect;

/// MySQL/MariaDB dialect implementation.
///
/// INSERT parameters are positional `?` markers. Named `:param` markers are
/// not used: mysql_async only parses lowercase `[a-z_][a-z0-9_]*` names, and
/// legacy source fields are often mixed case (`usrId`).
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn param_placeholder(&self, _index: usize, _name: &str) -> String {
        "?".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_placeholders() {
        let dialect = MysqlDialect::new();
        assert_eq!(dialect.param_placeholder(1, "usr_id"), "?");

        let q = dialect.build_insert_query(
            "users",
            &["id".to_string(), "name".to_string()],
            &["usr_id".to_string(), "usr_name".to_string()],
        );
        assert_eq!(q.sql, "INSERT INTO users (id, name) VALUES (?, ?)");
    }

    #[test]
    fn test_mixed_case_source_field_has_no_named_marker() {
        let q = MysqlDialect::new().build_insert_query(
            "users",
            &["id".to_string(), "pic".to_string()],
            &["usrId".to_string(), "col$1".to_string()],
        );
        assert_eq!(q.sql, "INSERT INTO users (id, pic) VALUES (?, ?)");
        assert!(!q.sql.contains("usrId"));
        assert_eq!(q.params, vec!["usrId", "col$1"]);
    }

    #[test]
    fn test_select_keeps_qualified_table() {
        let q = MysqlDialect::new().build_select_query("legacy.tbl_users", &["usr_id".to_string()]);
        assert_eq!(q.sql, "SELECT usr_id FROM legacy.tbl_users");
    }
}
