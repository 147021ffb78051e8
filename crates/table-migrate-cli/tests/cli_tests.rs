//! CLI integration tests for table-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! exit codes, and one end-to-end run between SQLite files.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use std::path::Path;

/// Get a command for the table-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("table-migrate").unwrap()
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.yaml");
    std::fs::write(&path, body).unwrap();
    path
}

fn sqlite_config(source: &Path, target: &Path, migrations: &str) -> String {
    format!(
        "databases:\n  from: {{ engine: sqlite, database: '{}' }}\n  to: {{ engine: sqlite, database: '{}' }}\nmigrations:\n{}",
        source.display(),
        target.display(),
        migrations
    )
}

const USERS_MIGRATION: &str = "  - from: tbl_users
    to: users
    transformations:
      - { from: usr_id, to: id, type: int }
      - { from: usr_name, to: name, type: string }
";

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--batch-size"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("table-migrate"));
}

#[test]
fn test_global_flag_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("[default: config.yaml]"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("[default: info]"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "validate"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "databases: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "validate"])
        .assert()
        .code(1);
}

#[test]
fn test_no_migrations_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "databases:\n  from: { host: a, database: x }\n  to: { host: b, database: y }\nmigrations: []\n",
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("at least one table migration"));
}

#[test]
fn test_unknown_engine_exits_with_code_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "databases:\n  from: { engine: oracle, host: a, database: x }\n  to: { host: b, database: y }\nmigrations:\n  - { from: a, to: b }\n",
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_sqlite_file_exits_with_code_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &sqlite_config(
            &dir.path().join("absent.db"),
            &dir.path().join("absent-too.db"),
            USERS_MIGRATION,
        ),
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .code(2);
}

// =============================================================================
// Validate and Dry Run Tests
// =============================================================================

#[test]
fn test_validate_accepts_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &sqlite_config(&dir.path().join("a.db"), &dir.path().join("b.db"), USERS_MIGRATION),
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Validation completed successfully (1 tables)"));
}

#[test]
fn test_validate_reports_table_without_mappings() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &sqlite_config(
            &dir.path().join("a.db"),
            &dir.path().join("b.db"),
            "  - { from: tbl_users, to: users }\n",
        ),
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "validate"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("tbl_users -> users"));
}

#[test]
fn test_dry_run_prints_statements_without_connecting() {
    let dir = tempfile::tempdir().unwrap();
    // Neither file exists; a dry run never opens them.
    let config = write_config(
        dir.path(),
        &sqlite_config(&dir.path().join("a.db"), &dir.path().join("b.db"), USERS_MIGRATION),
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SELECT usr_id, usr_name FROM tbl_users"))
        .stdout(predicate::str::contains("INSERT INTO users (id, name) VALUES (?1, ?2)"));
}

#[test]
fn test_zero_batch_size_override_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &sqlite_config(&dir.path().join("a.db"), &dir.path().join("b.db"), USERS_MIGRATION),
    );

    cmd()
        .args(["--config", config.to_str().unwrap(), "run", "--batch-size", "0"])
        .assert()
        .code(1);
}

// =============================================================================
// End-to-end Run
// =============================================================================

fn sqlite_file(path: &Path, statements: &[&str]) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = sqlx::SqlitePool::connect_with(options).await.unwrap();
        for sql in statements {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool.close().await;
    });
}

#[test]
fn test_run_prints_summary_and_exits_3_on_failed_rows() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    let target = dir.path().join("modern.db");
    sqlite_file(
        &source,
        &[
            "CREATE TABLE tbl_users (usr_id INTEGER, usr_name TEXT)",
            "INSERT INTO tbl_users VALUES (1, 'ada'), (2, 'grace'), (3, NULL)",
        ],
    );
    sqlite_file(&target, &["CREATE TABLE users (id INTEGER, name TEXT NOT NULL)"]);
    let config = write_config(dir.path(), &sqlite_config(&source, &target, USERS_MIGRATION));

    cmd()
        .args(["--config", config.to_str().unwrap(), "run"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("2 rows successfully migrated"))
        .stdout(predicate::str::contains("1 rows failed to migrate"));
}

#[test]
fn test_run_clean_with_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("legacy.db");
    let target = dir.path().join("modern.db");
    sqlite_file(
        &source,
        &[
            "CREATE TABLE tbl_users (usr_id INTEGER, usr_name TEXT)",
            "INSERT INTO tbl_users VALUES (1, 'ada'), (2, 'grace')",
        ],
    );
    sqlite_file(&target, &["CREATE TABLE users (id INTEGER, name TEXT)"]);
    let config = write_config(dir.path(), &sqlite_config(&source, &target, USERS_MIGRATION));

    cmd()
        .args(["--config", config.to_str().unwrap(), "--output-json", "run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success_count\": 2"))
        .stdout(predicate::str::contains("\"fail_count\": 0"));
}
