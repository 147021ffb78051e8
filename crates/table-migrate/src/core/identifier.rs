//! Identifier validation for generated SQL.
//!
//! Table and field names from the migration document are emitted into the
//! SELECT and INSERT text exactly as written, unquoted, so that
//! `schema.table` references and engine-specific case folding keep working.
//! Identifiers cannot be passed as statement parameters, which makes this
//! module the only thing standing between a hostile document and the
//! generated SQL: every name is checked here before any statement is built.

use crate::error::{MigrateError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - MySQL: 64 characters
/// - SQLite: unlimited
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
/// - Characters other than ASCII letters, digits, `_`, `$` and `.`
///
/// # Errors
///
/// Returns `MigrateError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.')))
    {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier {:?} contains unsupported character {:?}",
            name, bad
        )));
    }

    Ok(())
}

/// Validate a table name. `schema.table` is allowed.
pub fn validate_table_name(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if name.split('.').any(str::is_empty) {
        return Err(MigrateError::Config(format!(
            "Table name {:?} has an empty qualifier segment",
            name
        )));
    }
    Ok(())
}

/// Validate a field (column) name.
///
/// Field names are emitted unquoted in the select list and also key the
/// source row, so they must be plain identifiers: no `.` and no leading digit.
pub fn validate_field_name(name: &str) -> Result<()> {
    validate_identifier(name)?;
    if name.contains('.') {
        return Err(MigrateError::Config(format!(
            "Field name {:?} must not be qualified",
            name
        )));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(MigrateError::Config(format!(
            "Field name {:?} must not start with a digit",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("usr_name").is_ok());
        assert!(validate_identifier("legacy.tbl_users").is_ok());
        assert!(validate_identifier("col$1").is_ok());
    }

    #[test]
    fn test_validate_identifier_empty() {
        let result = validate_identifier("");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_null_byte() {
        let result = validate_identifier("users\0");
        assert!(result.unwrap_err().to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_too_long() {
        let long_name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let result = validate_identifier(&long_name);
        assert!(result.unwrap_err().to_string().contains("maximum length"));

        let max_name = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&max_name).is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_sql() {
        assert!(validate_identifier("users; DROP TABLE users").is_err());
        assert!(validate_identifier("name)").is_err());
        assert!(validate_identifier("a b").is_err());
    }

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("public.users").is_ok());
        assert!(validate_table_name(".users").is_err());
        assert!(validate_table_name("public.").is_err());
    }

    #[test]
    fn test_validate_field_name() {
        assert!(validate_field_name("usr_id").is_ok());
        assert!(validate_field_name("t.usr_id").is_err());
        assert!(validate_field_name("1col").is_err());
    }
}
