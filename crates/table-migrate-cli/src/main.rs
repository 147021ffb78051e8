//! table-migrate CLI - copy rows between databases with per-table field mappings.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use table_migrate::error::{EXIT_PARTIAL_FAILURE, EXIT_SUCCESS};
use table_migrate::{Config, MigrateError, Orchestrator};
use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "table-migrate")]
#[command(about = "Copy rows between databases with per-table field mappings")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured table migrations
    Run {
        /// Dry run: validate and show the statements without connecting
        #[arg(long)]
        dry_run: bool,

        /// Override rows per batch read from the source
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Validate the configuration and every table migration
    Validate,

    /// Test database connections
    HealthCheck,
}

/// How a command ended when it did not fail outright.
enum Outcome {
    Clean,
    Partial,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(Outcome::Clean) => ExitCode::from(EXIT_SUCCESS),
        Ok(Outcome::Partial) => ExitCode::from(EXIT_PARTIAL_FAILURE),
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<Outcome, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format)
        .map_err(|e| MigrateError::Config(e.to_string()))?;

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::Run {
            dry_run,
            batch_size,
        } => {
            let mut orchestrator = Orchestrator::from_config(&config)?;
            if let Some(size) = batch_size {
                if size == 0 {
                    return Err(MigrateError::Config(
                        "--batch-size must be at least 1".to_string(),
                    ));
                }
                orchestrator = orchestrator.with_batch_size(size);
            }

            if dry_run {
                return print_dry_run(&orchestrator, cli.output_json);
            }

            let cancel_token = setup_signal_handler().await?;
            let result = orchestrator.run(&cancel_token).await?;

            if cli.output_json {
                println!("{}", result.to_json()?);
            } else {
                println!("{} rows successfully migrated", result.success_count);
                println!("{} rows failed to migrate", result.fail_count);
                println!("  Run ID: {}", result.run_id);
                println!("  Duration: {:.2}s", result.duration_seconds);
                for table in result.failed_tables() {
                    println!(
                        "  {} -> {}: {:?} ({})",
                        table.source_table,
                        table.target_table,
                        table.status,
                        table.message.as_deref().unwrap_or("")
                    );
                }
                if result.cancelled {
                    println!("  Cancelled before all tables were migrated");
                }
            }

            if result.cancelled {
                Err(MigrateError::Cancelled)
            } else if result.is_clean() {
                Ok(Outcome::Clean)
            } else {
                Ok(Outcome::Partial)
            }
        }

        Commands::Validate => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let planned = orchestrator.dry_run()?;
            let invalid: Vec<_> = planned.iter().filter(|t| t.skip_reason.is_some()).collect();

            for table in &invalid {
                println!(
                    "  {} -> {}: {}",
                    table.source_table,
                    table.target_table,
                    table.skip_reason.as_deref().unwrap_or("")
                );
            }
            if !invalid.is_empty() {
                return Err(MigrateError::Config(format!(
                    "{} of {} table migrations are invalid",
                    invalid.len(),
                    planned.len()
                )));
            }

            println!("Validation completed successfully ({} tables)", planned.len());
            Ok(Outcome::Clean)
        }

        Commands::HealthCheck => {
            let orchestrator = Orchestrator::from_config(&config)?;
            let result = orchestrator.health_check().await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Health Check Results:");
                println!(
                    "  Source ({}): {} ({}ms)",
                    result.source_engine,
                    if result.source_connected { "OK" } else { "FAILED" },
                    result.source_latency_ms
                );
                if let Some(ref err) = result.source_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "  Target ({}): {} ({}ms)",
                    result.target_engine,
                    if result.target_connected { "OK" } else { "FAILED" },
                    result.target_latency_ms
                );
                if let Some(ref err) = result.target_error {
                    println!("    Error: {}", err);
                }
                println!(
                    "\n  Overall: {}",
                    if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
                );
            }

            if !result.healthy {
                return Err(MigrateError::connection(
                    "source/target",
                    "Health check failed",
                ));
            }
            Ok(Outcome::Clean)
        }
    }
}

fn print_dry_run(orchestrator: &Orchestrator, output_json: bool) -> Result<Outcome, MigrateError> {
    let planned = orchestrator.dry_run()?;

    if output_json {
        println!("{}", serde_json::to_string_pretty(&planned)?);
        return Ok(Outcome::Clean);
    }

    println!("Dry run: {} table migrations", planned.len());
    for table in &planned {
        println!("\n  {} -> {}", table.source_table, table.target_table);
        match (&table.select, &table.insert, &table.skip_reason) {
            (Some(select), Some(insert), _) => {
                println!("    {}", select);
                println!("    {}", insert);
            }
            (_, _, Some(reason)) => println!("    skipped: {}", reason),
            _ => {}
        }
    }
    Ok(Outcome::Clean)
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => return Err(format!("Invalid verbosity '{}'", other)),
    };

    // RUST_LOG wins over --verbosity when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::from_level(level).into()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        "json" => subscriber.json().init(),
        "text" => subscriber.init(),
        other => return Err(format!("Invalid log format '{}'", other)),
    }

    Ok(())
}

/// Setup signal handlers for graceful shutdown.
/// Handles both SIGINT (Ctrl-C) and SIGTERM.
/// Returns a CancellationToken that will be cancelled when a signal is received.
#[cfg(unix)]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let token_int = cancel_token.clone();
    tokio::spawn(async move {
        sigint.recv().await;
        eprintln!("\nReceived SIGINT. Finishing the current row and stopping...");
        token_int.cancel();
    });

    let token_term = cancel_token.clone();
    tokio::spawn(async move {
        sigterm.recv().await;
        eprintln!("\nReceived SIGTERM. Finishing the current row and stopping...");
        token_term.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler() -> Result<CancellationToken, MigrateError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Finishing the current row and stopping...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
