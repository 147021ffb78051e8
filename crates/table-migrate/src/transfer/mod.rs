//! Migration engine.
//!
//! Tables are migrated one at a time, in plan order. For each table the
//! engine streams the source rows through a bounded channel and issues one
//! parameterized INSERT per row:
//!
//! ```text
//! SourceReader::read_table ──batches──▶ transform ─▶ bind ─▶ TargetWriter::insert_row
//! ```
//!
//! Failure isolation:
//! - a rejected INSERT (or a value that cannot be bound) counts one failed
//!   row and the loop moves on to the next row;
//! - a failing SELECT abandons the rest of that table only;
//! - a table that fails validation is skipped before any query runs.

pub mod record;
pub mod tracker;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::schema::{MigrationPlan, TableMigration};
use crate::core::traits::{Dialect, InsertQuery, SelectQuery, SourceReader, TargetWriter};
use crate::core::value::SourceRow;
use crate::error::Result;

pub use record::{transform, TargetField, TargetRecord};
pub use tracker::{ResultTracker, RowFailure, RunResult, TableOutcome, TableStatus};

/// Default number of rows per source batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default cap on recorded row failures.
pub const DEFAULT_MAX_RECORDED_FAILURES: usize = 1000;

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Rows per batch pulled from the source cursor.
    pub batch_size: usize,

    /// Row failures kept with their messages; further failures are only counted.
    pub max_recorded_failures: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_recorded_failures: DEFAULT_MAX_RECORDED_FAILURES,
        }
    }
}

/// A validated table migration with its statements built.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Table migration this job runs.
    pub table: TableMigration,

    /// SELECT of the mapped source fields.
    pub select: SelectQuery,

    /// INSERT of the mapped destination fields.
    pub insert: InsertQuery,
}

impl TransferJob {
    /// Validate `table` and build its statements.
    ///
    /// # Errors
    ///
    /// `MigrateError::Config` when the table migration is invalid.
    pub fn prepare(
        table: &TableMigration,
        source: &dyn Dialect,
        target: &dyn Dialect,
    ) -> Result<Self> {
        table.validate()?;
        let source_fields = table.source_fields();
        let select = source.build_select_query(&table.source_table, &source_fields);
        let insert =
            target.build_insert_query(&table.target_table, &table.target_fields(), &source_fields);
        Ok(Self {
            table: table.clone(),
            select,
            insert,
        })
    }
}

/// Runs a [`MigrationPlan`] against an open reader and writer.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Migrate every table of `plan`.
    ///
    /// Never fails as a whole: row, table and validation failures are all
    /// reported through the returned [`RunResult`]. Connections are owned by
    /// the caller and are not closed here.
    pub async fn migrate(
        &self,
        plan: &MigrationPlan,
        source: &dyn SourceReader,
        target: &dyn TargetWriter,
        cancel: &CancellationToken,
    ) -> RunResult {
        let mut tracker = ResultTracker::new(self.config.max_recorded_failures);
        info!(
            run_id = tracker.run_id(),
            tables = plan.tables.len(),
            from = %plan.from.location(),
            to = %plan.to.location(),
            "Starting migration"
        );

        // Every table is validated before the first query runs.
        let jobs: Vec<_> = plan
            .tables
            .iter()
            .map(|t| TransferJob::prepare(t, source.dialect(), target.dialect()))
            .collect();

        for (table, job) in plan.tables.iter().zip(jobs) {
            if cancel.is_cancelled() {
                tracker.cancel();
                break;
            }
            match job {
                Ok(job) => self.transfer_table(&job, source, target, cancel, &mut tracker).await,
                Err(e) => {
                    warn!(table = %table.label(), "Skipping table migration: {}", e);
                    tracker.skip_table(&table.source_table, &table.target_table, e.to_string());
                }
            }
            if tracker.is_cancelled() {
                break;
            }
        }

        let result = tracker.finish();
        info!(
            run_id = %result.run_id,
            succeeded = result.success_count,
            failed = result.fail_count,
            cancelled = result.cancelled,
            duration_secs = result.duration_seconds,
            "Migration finished"
        );
        result
    }

    async fn transfer_table(
        &self,
        job: &TransferJob,
        source: &dyn SourceReader,
        target: &dyn TargetWriter,
        cancel: &CancellationToken,
        tracker: &mut ResultTracker,
    ) {
        let label = job.table.label();
        tracker.begin_table(&job.table.source_table, &job.table.target_table);
        debug!(table = %label, select = %job.select.sql, insert = %job.insert.sql, "Transferring table");

        let mut batches = source.read_table(&job.select, self.config.batch_size.max(1));
        let mut row_index: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(table = %label, rows = row_index, "Cancelled mid-table");
                    tracker.cancel_table();
                    return;
                }
                batch = batches.recv() => batch,
            };

            let batch = match next {
                Some(Ok(batch)) => batch,
                Some(Err(e)) => {
                    warn!(table = %label, rows = row_index, "Abandoning table: {}", e);
                    tracker.abandon_table(e.to_string());
                    return;
                }
                None => break,
            };

            for row in &batch.rows {
                if cancel.is_cancelled() {
                    info!(table = %label, rows = row_index, "Cancelled mid-table");
                    tracker.cancel_table();
                    return;
                }
                match insert_row(job, row, target).await {
                    Ok(_) => tracker.record_success(),
                    Err(e) => {
                        warn!(table = %label, row = row_index, "Row failed: {}", e);
                        tracker.record_failure(row_index, e.to_string());
                    }
                }
                row_index += 1;
            }
        }

        info!(table = %label, rows = row_index, "Table complete");
    }
}

async fn insert_row(job: &TransferJob, row: &SourceRow, target: &dyn TargetWriter) -> Result<u64> {
    let values = transform(row, &job.table.field_mappings)?.bind()?;
    target.insert_row(&job.insert, &values).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{ConnectionSpec, DbEngine, FieldMapping};
    use crate::core::value::{Batch, SqlValue};
    use crate::error::MigrateError;
    use crate::typemap::BoundValue;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    struct TestDialect;

    impl Dialect for TestDialect {
        fn name(&self) -> &str {
            "test"
        }

        fn param_placeholder(&self, _index: usize, name: &str) -> String {
            format!(":{}", name)
        }
    }

    /// In-memory source. A table missing from `tables` fails its SELECT.
    #[derive(Default)]
    struct FakeSource {
        tables: HashMap<String, Vec<SourceRow>>,
        /// Tables whose stream fails after this many rows.
        fail_after: HashMap<String, usize>,
        selects: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn with_table(mut self, name: &str, rows: Vec<SourceRow>) -> Self {
            self.tables.insert(name.to_string(), rows);
            self
        }
    }

    #[async_trait]
    impl SourceReader for FakeSource {
        fn dialect(&self) -> &dyn Dialect {
            &TestDialect
        }

        fn read_table(&self, query: &SelectQuery, batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
            self.selects.lock().unwrap().push(query.sql.clone());
            let (tx, rx) = mpsc::channel(4);
            let rows = self.tables.get(&query.table).cloned();
            let fail_after = self.fail_after.get(&query.table).copied();
            let table = query.table.clone();
            tokio::spawn(async move {
                let Some(rows) = rows else {
                    let _ = tx
                        .send(Err(MigrateError::extraction(&table, format!("table {} doesn't exist", table))))
                        .await;
                    return;
                };
                let limit = fail_after.unwrap_or(rows.len());
                for chunk in rows[..limit].chunks(batch_size) {
                    if tx.send(Ok(Batch::new(chunk.to_vec()))).await.is_err() {
                        return;
                    }
                }
                if fail_after.is_some() {
                    let _ = tx.send(Err(MigrateError::extraction(&table, "connection lost"))).await;
                }
            });
            rx
        }

        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        fn db_type(&self) -> &str {
            "test"
        }

        async fn close(&self) {}
    }

    /// In-memory target. The first bound value acts as a primary key.
    #[derive(Default)]
    struct FakeTarget {
        rows: Mutex<Vec<(String, Vec<BoundValue>)>>,
        keys: Mutex<HashSet<(String, BoundValue)>>,
        cancel_after: Option<(usize, CancellationToken)>,
    }

    impl FakeTarget {
        fn rows_for(&self, table: &str) -> Vec<Vec<BoundValue>> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| t == table)
                .map(|(_, v)| v.clone())
                .collect()
        }
    }

    #[async_trait]
    impl TargetWriter for FakeTarget {
        fn dialect(&self) -> &dyn Dialect {
            &TestDialect
        }

        async fn insert_row(&self, query: &InsertQuery, values: &[BoundValue]) -> Result<u64> {
            assert_eq!(values.len(), query.params.len());
            let key = (query.table.clone(), values[0].clone());
            if !self.keys.lock().unwrap().insert(key) {
                return Err(MigrateError::row_insert(&query.table, "duplicate key"));
            }
            let mut rows = self.rows.lock().unwrap();
            rows.push((query.table.clone(), values.to_vec()));
            if let Some((n, token)) = &self.cancel_after {
                if rows.len() >= *n {
                    token.cancel();
                }
            }
            Ok(1)
        }

        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        fn db_type(&self) -> &str {
            "test"
        }

        async fn close(&self) {}
    }

    fn conn() -> ConnectionSpec {
        ConnectionSpec {
            engine: DbEngine::Sqlite,
            host: String::new(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: ":memory:".into(),
            ssl_mode: None,
        }
    }

    fn plan(tables: Vec<TableMigration>) -> MigrationPlan {
        MigrationPlan {
            from: conn(),
            to: conn(),
            tables,
        }
    }

    fn users_migration() -> TableMigration {
        TableMigration::new(
            "tbl_users",
            "users",
            vec![
                FieldMapping::new("usr_id", "id", "int"),
                FieldMapping::new("usr_name", "name", "string"),
            ],
        )
    }

    fn user(id: i64, name: &str) -> SourceRow {
        SourceRow::from_pairs([("usr_id", SqlValue::Int(id)), ("usr_name", SqlValue::from(name))])
    }

    fn engine(batch_size: usize) -> TransferEngine {
        TransferEngine::new(TransferConfig {
            batch_size,
            ..TransferConfig::default()
        })
    }

    #[test]
    fn test_prepare_builds_statements() {
        let job = TransferJob::prepare(&users_migration(), &TestDialect, &TestDialect).unwrap();
        assert_eq!(job.select.sql, "SELECT usr_id, usr_name FROM tbl_users");
        assert_eq!(
            job.insert.sql,
            "INSERT INTO users (id, name) VALUES (:usr_id, :usr_name)"
        );
    }

    #[tokio::test]
    async fn test_all_rows_migrated_in_order() {
        let rows: Vec<_> = (1..=5).map(|i| user(i, &format!("u{}", i))).collect();
        let source = FakeSource::default().with_table("tbl_users", rows);
        let target = FakeTarget::default();

        let result = engine(2)
            .migrate(&plan(vec![users_migration()]), &source, &target, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 5);
        assert_eq!(result.fail_count, 0);
        assert!(result.is_clean());
        let ids: Vec<_> = target
            .rows_for("users")
            .into_iter()
            .map(|r| r[0].clone())
            .collect();
        assert_eq!(ids, (1..=5).map(BoundValue::Int).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_rejected_row_does_not_stop_table() {
        let rows = vec![user(1, "a"), user(2, "b"), user(1, "dup"), user(3, "c"), user(4, "d")];
        let source = FakeSource::default().with_table("tbl_users", rows);
        let target = FakeTarget::default();

        let result = engine(10)
            .migrate(&plan(vec![users_migration()]), &source, &target, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 4);
        assert_eq!(result.fail_count, 1);
        assert_eq!(result.failures[0].row_index, 2);
        assert!(result.failures[0].message.contains("duplicate key"));
        assert_eq!(result.tables[0].status, TableStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_select_abandons_only_that_table() {
        let missing = TableMigration::new(
            "tbl_missing",
            "missing",
            vec![FieldMapping::new("x", "x", "string")],
        );
        let source = FakeSource::default().with_table("tbl_users", vec![user(1, "a"), user(2, "b")]);
        let target = FakeTarget::default();

        let result = engine(10)
            .migrate(
                &plan(vec![missing, users_migration()]),
                &source,
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.success_count, 2);
        assert_eq!(result.fail_count, 0);
        assert_eq!(result.tables[0].status, TableStatus::Abandoned);
        assert!(result.tables[0]
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("doesn't exist"));
        assert_eq!(result.tables[1].status, TableStatus::Completed);
    }

    #[tokio::test]
    async fn test_stream_error_keeps_inserted_rows() {
        let rows: Vec<_> = (1..=6).map(|i| user(i, "x")).collect();
        let mut source = FakeSource::default().with_table("tbl_users", rows);
        source.fail_after.insert("tbl_users".into(), 3);
        let target = FakeTarget::default();

        let result = engine(2)
            .migrate(&plan(vec![users_migration()]), &source, &target, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 3);
        assert_eq!(result.tables[0].rows_succeeded, 3);
        assert_eq!(result.tables[0].status, TableStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_invalid_table_skipped_before_any_query() {
        let empty = TableMigration::new("tbl_a", "a", vec![]);
        let source = FakeSource::default().with_table("tbl_users", vec![user(1, "a")]);
        let target = FakeTarget::default();

        let result = engine(10)
            .migrate(
                &plan(vec![empty, users_migration()]),
                &source,
                &target,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.tables[0].status, TableStatus::Skipped);
        assert_eq!(result.tables[1].status, TableStatus::Completed);
        assert_eq!(
            *source.selects.lock().unwrap(),
            vec!["SELECT usr_id, usr_name FROM tbl_users".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unbindable_value_counts_as_failed_row() {
        let rows = vec![
            SourceRow::from_pairs([("usr_id", SqlValue::from("42")), ("usr_name", SqlValue::from("a"))]),
            SourceRow::from_pairs([("usr_id", SqlValue::from("n/a")), ("usr_name", SqlValue::from("b"))]),
        ];
        let source = FakeSource::default().with_table("tbl_users", rows);
        let target = FakeTarget::default();

        let result = engine(10)
            .migrate(&plan(vec![users_migration()]), &source, &target, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 1);
        assert_eq!(result.fail_count, 1);
        assert_eq!(target.rows_for("users")[0][0], BoundValue::Int(42));
    }

    #[tokio::test]
    async fn test_empty_table_completes() {
        let source = FakeSource::default().with_table("tbl_users", vec![]);
        let target = FakeTarget::default();

        let result = engine(10)
            .migrate(&plan(vec![users_migration()]), &source, &target, &CancellationToken::new())
            .await;

        assert_eq!(result.success_count, 0);
        assert_eq!(result.tables[0].status, TableStatus::Completed);
        assert!(result.is_clean());
    }

    #[tokio::test]
    async fn test_counts_are_per_run() {
        let source = FakeSource::default().with_table("tbl_users", vec![user(1, "a"), user(2, "b")]);
        let target = FakeTarget::default();
        let engine = engine(10);
        let plan = plan(vec![users_migration()]);

        let first = engine.migrate(&plan, &source, &target, &CancellationToken::new()).await;
        let second = engine.migrate(&plan, &source, &target, &CancellationToken::new()).await;

        assert_eq!(first.success_count, 2);
        // Keys already exist on the second run.
        assert_eq!(second.success_count, 0);
        assert_eq!(second.fail_count, 2);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_cancellation_stops_run() {
        let rows: Vec<_> = (1..=10).map(|i| user(i, "x")).collect();
        let source = FakeSource::default()
            .with_table("tbl_users", rows)
            .with_table("tbl_other", vec![user(1, "y")]);
        let token = CancellationToken::new();
        let target = FakeTarget {
            cancel_after: Some((3, token.clone())),
            ..FakeTarget::default()
        };
        let other = TableMigration::new("tbl_other", "other", users_migration().field_mappings);

        let result = engine(100)
            .migrate(&plan(vec![users_migration(), other]), &source, &target, &token)
            .await;

        assert!(result.cancelled);
        assert_eq!(result.success_count, 3);
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.tables[0].status, TableStatus::Cancelled);
        assert!(!result.is_clean());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let source = FakeSource::default().with_table("tbl_users", vec![user(1, "a")]);
        let target = FakeTarget::default();
        let token = CancellationToken::new();
        token.cancel();

        let result = engine(10)
            .migrate(&plan(vec![users_migration()]), &source, &target, &token)
            .await;

        assert!(result.cancelled);
        assert!(result.tables.is_empty());
        assert!(source.selects.lock().unwrap().is_empty());
    }
}
