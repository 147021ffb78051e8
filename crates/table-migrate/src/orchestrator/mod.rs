//! Migration orchestrator - main workflow coordinator.
//!
//! Owns the connection lifecycle around a [`TransferEngine`] run: both
//! connections are opened before the first table and closed after the last,
//! whatever happened in between.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::core::schema::{ConnectionSpec, MigrationPlan};
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::{connect_source, connect_target, DialectImpl};
use crate::error::Result;
use crate::transfer::{RunResult, TransferConfig, TransferEngine, TransferJob};

/// Opens the reader and writer for a run.
#[async_trait]
trait Connector: Send + Sync {
    async fn source(&self, spec: &ConnectionSpec) -> Result<Box<dyn SourceReader>>;
    async fn target(&self, spec: &ConnectionSpec) -> Result<Box<dyn TargetWriter>>;
}

/// Connects through the compiled-in drivers.
struct DriverConnector;

#[async_trait]
impl Connector for DriverConnector {
    async fn source(&self, spec: &ConnectionSpec) -> Result<Box<dyn SourceReader>> {
        connect_source(spec).await
    }

    async fn target(&self, spec: &ConnectionSpec) -> Result<Box<dyn TargetWriter>> {
        connect_target(spec).await
    }
}

/// Migration orchestrator.
pub struct Orchestrator {
    plan: MigrationPlan,
    transfer: TransferConfig,
}

/// Result of a connection health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Engine of the source connection.
    pub source_engine: String,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,

    /// Engine of the destination connection.
    pub target_engine: String,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,

    /// Both sides connected.
    pub healthy: bool,
}

/// Statements a table migration would run, or why it would be skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTable {
    pub source_table: String,
    pub target_table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(plan: MigrationPlan, transfer: TransferConfig) -> Self {
        Self { plan, transfer }
    }

    /// Create an orchestrator from a loaded configuration document.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.to_plan()?, config.transfer_config()))
    }

    /// Override the batch size from the document.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.transfer.batch_size = batch_size;
        self
    }

    pub fn plan(&self) -> &MigrationPlan {
        &self.plan
    }

    pub fn transfer_config(&self) -> &TransferConfig {
        &self.transfer
    }

    /// Run the migration.
    ///
    /// # Errors
    ///
    /// Only startup failures are errors: a driver that is not compiled in, or
    /// a connection that cannot be opened. Everything after that is reported
    /// in the returned [`RunResult`].
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RunResult> {
        DialectImpl::for_engine(self.plan.from.engine)?;
        DialectImpl::for_engine(self.plan.to.engine)?;

        for line in self.plan.summary() {
            info!("Planned: {}", line);
        }

        self.run_with(&DriverConnector, cancel).await
    }

    async fn run_with<C: Connector>(
        &self,
        connector: &C,
        cancel: &CancellationToken,
    ) -> Result<RunResult> {
        let source = connector.source(&self.plan.from).await.map_err(|e| {
            error!("Source connection failed: {}", e);
            e
        })?;

        let target = match connector.target(&self.plan.to).await {
            Ok(target) => target,
            Err(e) => {
                error!("Target connection failed: {}", e);
                source.close().await;
                return Err(e);
            }
        };

        let result = TransferEngine::new(self.transfer)
            .migrate(&self.plan, source.as_ref(), target.as_ref(), cancel)
            .await;

        target.close().await;
        source.close().await;

        Ok(result)
    }

    /// Open both connections, run a trivial query on each, close them.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let (source_connected, source_latency_ms, source_error) =
            check_side(&DriverConnector, &self.plan.from, true).await;
        let (target_connected, target_latency_ms, target_error) =
            check_side(&DriverConnector, &self.plan.to, false).await;

        Ok(HealthCheckResult {
            source_engine: self.plan.from.engine.to_string(),
            source_connected,
            source_latency_ms,
            source_error,
            target_engine: self.plan.to.engine.to_string(),
            target_connected,
            target_latency_ms,
            target_error,
            healthy: source_connected && target_connected,
        })
    }

    /// Build every table's statements without connecting.
    pub fn dry_run(&self) -> Result<Vec<PlannedTable>> {
        let source = DialectImpl::for_engine(self.plan.from.engine)?;
        let target = DialectImpl::for_engine(self.plan.to.engine)?;

        Ok(self
            .plan
            .tables
            .iter()
            .map(|table| {
                let (select, insert, skip_reason) =
                    match TransferJob::prepare(table, &source, &target) {
                        Ok(job) => (Some(job.select.sql), Some(job.insert.sql), None),
                        Err(e) => (None, None, Some(e.to_string())),
                    };
                PlannedTable {
                    source_table: table.source_table.clone(),
                    target_table: table.target_table.clone(),
                    select,
                    insert,
                    skip_reason,
                }
            })
            .collect())
    }
}

/// Connect and test one side. Returns (connected, latency_ms, error).
async fn check_side<C: Connector>(
    connector: &C,
    spec: &ConnectionSpec,
    is_source: bool,
) -> (bool, u64, Option<String>) {
    let start = Instant::now();
    let outcome = if is_source {
        match connector.source(spec).await {
            Ok(reader) => {
                let tested = reader.test_connection().await;
                reader.close().await;
                tested
            }
            Err(e) => Err(e),
        }
    } else {
        match connector.target(spec).await {
            Ok(writer) => {
                let tested = writer.test_connection().await;
                writer.close().await;
                tested
            }
            Err(e) => Err(e),
        }
    };
    let latency = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => (true, latency, None),
        Err(e) => (false, latency, Some(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{DbEngine, FieldMapping, TableMigration};
    use crate::core::traits::{Dialect, SelectQuery};
    use crate::core::value::Batch;
    use crate::error::MigrateError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    struct TestDialect;

    impl Dialect for TestDialect {
        fn name(&self) -> &str {
            "test"
        }

        fn param_placeholder(&self, _index: usize, _name: &str) -> String {
            "?".to_string()
        }
    }

    /// Source that records whether it was closed.
    struct ClosingSource {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl SourceReader for ClosingSource {
        fn dialect(&self) -> &dyn Dialect {
            &TestDialect
        }

        fn read_table(&self, _query: &SelectQuery, _batch_size: usize) -> mpsc::Receiver<Result<Batch>> {
            let (_tx, rx) = mpsc::channel(1);
            rx
        }

        async fn test_connection(&self) -> Result<()> {
            Ok(())
        }

        fn db_type(&self) -> &str {
            "test"
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Source connects, target is unreachable.
    struct UnreachableTarget {
        closed: Arc<AtomicBool>,
        source_opened: AtomicBool,
    }

    #[async_trait]
    impl Connector for UnreachableTarget {
        async fn source(&self, _spec: &ConnectionSpec) -> Result<Box<dyn SourceReader>> {
            self.source_opened.store(true, Ordering::SeqCst);
            Ok(Box::new(ClosingSource {
                closed: self.closed.clone(),
            }))
        }

        async fn target(&self, spec: &ConnectionSpec) -> Result<Box<dyn TargetWriter>> {
            Err(MigrateError::connection(spec.engine.to_string(), "connection refused"))
        }
    }

    fn spec(engine: DbEngine, database: &str) -> ConnectionSpec {
        ConnectionSpec {
            engine,
            host: "localhost".into(),
            port: None,
            username: "app".into(),
            password: "secret".into(),
            database: database.into(),
            ssl_mode: None,
        }
    }

    fn plan(from: DbEngine, to: DbEngine) -> MigrationPlan {
        MigrationPlan {
            from: spec(from, "legacy"),
            to: spec(to, "modern"),
            tables: vec![
                TableMigration::new(
                    "tbl_users",
                    "users",
                    vec![
                        FieldMapping::new("usr_id", "id", "int"),
                        FieldMapping::new("usr_name", "name", "string"),
                    ],
                ),
                TableMigration::new("tbl_empty", "empty", vec![]),
            ],
        }
    }

    #[cfg(all(feature = "mysql", feature = "postgres"))]
    #[test]
    fn test_dry_run_uses_each_side_dialect() {
        let orchestrator = Orchestrator::new(
            plan(DbEngine::Mysql, DbEngine::Postgres),
            TransferConfig::default(),
        );
        let planned = orchestrator.dry_run().unwrap();

        assert_eq!(
            planned[0].select.as_deref(),
            Some("SELECT usr_id, usr_name FROM tbl_users")
        );
        assert_eq!(
            planned[0].insert.as_deref(),
            Some("INSERT INTO users (id, name) VALUES ($1, $2)")
        );
        assert!(planned[1].select.is_none());
        assert!(planned[1]
            .skip_reason
            .as_deref()
            .unwrap_or_default()
            .contains("no field mappings"));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_missing_sqlite_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.db");
        let mut plan = plan(DbEngine::Sqlite, DbEngine::Sqlite);
        plan.from.database = missing.display().to_string();
        plan.to.database = missing.display().to_string();

        let err = Orchestrator::new(plan, TransferConfig::default())
            .run(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONNECTION_ERROR);
    }

    #[tokio::test]
    async fn test_target_failure_closes_open_source() {
        let connector = UnreachableTarget {
            closed: Arc::new(AtomicBool::new(false)),
            source_opened: AtomicBool::new(false),
        };
        let orchestrator = Orchestrator::new(
            plan(DbEngine::Sqlite, DbEngine::Sqlite),
            TransferConfig::default(),
        );

        let err = orchestrator
            .run_with(&connector, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), crate::error::EXIT_CONNECTION_ERROR);
        assert!(connector.source_opened.load(Ordering::SeqCst));
        assert!(connector.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_health_check_reports_target_error() {
        let connector = UnreachableTarget {
            closed: Arc::new(AtomicBool::new(false)),
            source_opened: AtomicBool::new(false),
        };
        let spec = spec(DbEngine::Sqlite, "modern");

        let (connected, _, error) = check_side(&connector, &spec, true).await;
        assert!(connected);
        assert!(error.is_none());
        assert!(connector.closed.load(Ordering::SeqCst));

        let (connected, _, error) = check_side(&connector, &spec, false).await;
        assert!(!connected);
        assert!(error.unwrap_or_default().contains("connection refused"));
    }

    #[test]
    fn test_batch_size_override() {
        let orchestrator = Orchestrator::new(
            plan(DbEngine::Sqlite, DbEngine::Sqlite),
            TransferConfig::default(),
        )
        .with_batch_size(10);
        assert_eq!(orchestrator.transfer_config().batch_size, 10);
    }
}
