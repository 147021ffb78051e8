//! Run outcome accounting.
//!
//! A [`ResultTracker`] is created fresh for every `migrate` call and consumed
//! by [`ResultTracker::finish`], so counts can never leak between runs.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Final state of one table migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    /// Every source row was attempted.
    Completed,
    /// Rejected by validation before any query ran.
    Skipped,
    /// The source query failed; remaining rows were not attempted.
    Abandoned,
    /// The run was cancelled while this table was in progress.
    Cancelled,
}

/// Per-table outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOutcome {
    pub source_table: String,
    pub target_table: String,
    pub rows_succeeded: u64,
    pub rows_failed: u64,
    pub status: TableStatus,
    /// Why the table was skipped or abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A row whose INSERT failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowFailure {
    pub source_table: String,
    pub target_table: String,
    /// Zero-based position of the row in the source result set.
    pub row_index: u64,
    pub message: String,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Rows inserted successfully.
    pub success_count: u64,

    /// Rows whose INSERT failed.
    pub fail_count: u64,

    /// Outcome of every table migration that was started or skipped, in plan order.
    pub tables: Vec<TableOutcome>,

    /// Recorded row failures (at most `max_recorded_failures`).
    pub failures: Vec<RowFailure>,

    /// Row failures counted but not recorded because the cap was reached.
    pub failures_truncated: u64,

    /// Whether the run stopped early on a cancellation request.
    pub cancelled: bool,
}

impl RunResult {
    /// No failed rows, no skipped or abandoned tables, not cancelled.
    pub fn is_clean(&self) -> bool {
        self.fail_count == 0
            && !self.cancelled
            && self
                .tables
                .iter()
                .all(|t| t.status == TableStatus::Completed)
    }

    /// Tables that were skipped or abandoned.
    pub fn failed_tables(&self) -> Vec<&TableOutcome> {
        self.tables
            .iter()
            .filter(|t| matches!(t.status, TableStatus::Skipped | TableStatus::Abandoned))
            .collect()
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Accumulates outcomes for one run.
#[derive(Debug)]
pub struct ResultTracker {
    run_id: String,
    started_at: DateTime<Utc>,
    timer: Instant,
    max_recorded_failures: usize,
    success_count: u64,
    fail_count: u64,
    tables: Vec<TableOutcome>,
    failures: Vec<RowFailure>,
    failures_truncated: u64,
    cancelled: bool,
}

impl ResultTracker {
    /// Start tracking a new run with zeroed counters.
    pub fn new(max_recorded_failures: usize) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            timer: Instant::now(),
            max_recorded_failures,
            success_count: 0,
            fail_count: 0,
            tables: Vec::new(),
            failures: Vec::new(),
            failures_truncated: 0,
            cancelled: false,
        }
    }

    /// Run identifier, for log correlation.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Open the outcome for a table about to be migrated.
    pub fn begin_table(&mut self, source_table: &str, target_table: &str) {
        self.tables.push(TableOutcome {
            source_table: source_table.to_string(),
            target_table: target_table.to_string(),
            rows_succeeded: 0,
            rows_failed: 0,
            status: TableStatus::Completed,
            message: None,
        });
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
        if let Some(table) = self.tables.last_mut() {
            table.rows_succeeded += 1;
        }
    }

    pub fn record_failure(&mut self, row_index: u64, message: impl Into<String>) {
        self.fail_count += 1;
        let Some(table) = self.tables.last_mut() else {
            return;
        };
        table.rows_failed += 1;
        if self.failures.len() < self.max_recorded_failures {
            self.failures.push(RowFailure {
                source_table: table.source_table.clone(),
                target_table: table.target_table.clone(),
                row_index,
                message: message.into(),
            });
        } else {
            self.failures_truncated += 1;
        }
    }

    /// Record a table rejected before any query ran.
    pub fn skip_table(&mut self, source_table: &str, target_table: &str, message: impl Into<String>) {
        self.tables.push(TableOutcome {
            source_table: source_table.to_string(),
            target_table: target_table.to_string(),
            rows_succeeded: 0,
            rows_failed: 0,
            status: TableStatus::Skipped,
            message: Some(message.into()),
        });
    }

    /// Mark the current table as abandoned after a source failure.
    pub fn abandon_table(&mut self, message: impl Into<String>) {
        if let Some(table) = self.tables.last_mut() {
            table.status = TableStatus::Abandoned;
            table.message = Some(message.into());
        }
    }

    /// Mark the current table, and the run, as cancelled.
    pub fn cancel_table(&mut self) {
        if let Some(table) = self.tables.last_mut() {
            table.status = TableStatus::Cancelled;
        }
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Mark the run as cancelled between tables.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Close the run and produce its result.
    pub fn finish(self) -> RunResult {
        RunResult {
            run_id: self.run_id,
            started_at: self.started_at,
            completed_at: Utc::now(),
            duration_seconds: self.timer.elapsed().as_secs_f64(),
            success_count: self.success_count,
            fail_count: self.fail_count,
            tables: self.tables,
            failures: self.failures,
            failures_truncated: self.failures_truncated,
            cancelled: self.cancelled,
        }
    }
}
