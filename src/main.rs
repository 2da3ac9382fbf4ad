use std::{process, sync::Arc, time::Duration};

use autopurge::{
    config::AppConfig,
    db::DbPool,
    ingest::{DatabaseSink, IngestBuffer},
    maintenance::{ConsumerPauseState, MaintenanceFlags},
    notice::{Notice, TracingNotices},
    observability,
    retention::{
        PurgeCoordinator, PurgeOutcome, RetentionDecision, format_duration, join_auto_purge,
        start_auto_purge,
    },
};
use clap::Parser;

/// How long a running purge may keep going after a shutdown signal.
const PURGE_SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// CLI arguments for the auto-purge host
#[derive(Parser, Debug)]
#[command(version, about = "Retention purge for activity tables", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "autopurge.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Open the store, start ingestion, and run the auto-purge once (default)
    Run,
    /// Load the config and print the retention decision
    Check,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::from_file(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            process::exit(1);
        }
    };

    match args.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Check => run_check(&config),
    }
}

fn run_check(config: &AppConfig) {
    let engine = config
        .database
        .engine()
        .map(|engine| engine.to_string())
        .unwrap_or_else(|| "none".to_string());

    match config.retention.decision() {
        RetentionDecision::Disabled => println!("Auto-purge disabled."),
        RetentionDecision::TooShort => println!("{}", Notice::AutoPurgeMinimum),
        RetentionDecision::Eligible(secs) => {
            println!(
                "Auto-purge enabled: removing data older than {} ({secs} seconds).",
                format_duration(secs)
            );
            println!("  store:        {engine}");
            println!("  table prefix: {}", config.retention.table_prefix);
            println!("  dry run:      {}", config.retention.dry_run);
        }
    }
}

async fn run(config: AppConfig) {
    observability::init_tracing(&config.observability).expect("Failed to initialize tracing");

    if let Err(e) = observability::metrics::init_metrics(&config.observability.metrics) {
        tracing::warn!(error = %e, "Failed to initialize metrics");
    }

    if config.database.is_none() {
        eprintln!("Error: a [database] section is required to run the auto-purge.");
        process::exit(1);
    }

    let db = Arc::new(
        DbPool::from_config(&config.database)
            .await
            .expect("Failed to connect to database"),
    );

    let flags = Arc::new(MaintenanceFlags::new());
    let consumer = Arc::new(ConsumerPauseState::new());

    if config.database.run_migrations() {
        flags.set_migration_running(true);
        let migrated = db.run_migrations(&config.retention.table_prefix).await;
        flags.set_migration_running(false);
        migrated.expect("Failed to run migrations");
    }

    let buffer = Arc::new(IngestBuffer::new(
        (&config.ingest.buffer).into(),
        Arc::clone(&consumer),
    ));
    let buffer_handle = buffer.start_worker(Arc::new(DatabaseSink::new(
        db.activity(),
        config.retention.table_prefix.clone(),
    )));

    let coordinator = PurgeCoordinator::new(
        config.retention.clone(),
        db.engine(),
        db.connections(),
        flags,
        consumer,
        Arc::new(TracingNotices),
    );

    match start_auto_purge(coordinator) {
        Some(handle) => {
            if let Some(outcome) =
                join_auto_purge(handle, shutdown_signal(), PURGE_SHUTDOWN_GRACE).await
            {
                log_outcome(&outcome);
            }
        }
        None => tracing::info!("No auto-purge scheduled"),
    }

    buffer.shutdown();
    if let Err(e) = tokio::time::timeout(Duration::from_secs(5), buffer_handle).await {
        tracing::warn!(error = %e, "Timeout waiting for ingest buffer to flush");
    }

    db.close().await;
    tracing::info!("Shutdown complete");
}

fn log_outcome(outcome: &PurgeOutcome) {
    match outcome {
        PurgeOutcome::Completed(run) => tracing::info!(
            cutoff = run.cutoff,
            total_removed = run.total_removed,
            failed_tables = run.failed_tables().count(),
            compacted = run.compaction_attempted,
            dry_run = run.dry_run,
            "Auto-purge finished"
        ),
        PurgeOutcome::Failed(reason) => {
            tracing::error!(reason = %reason, "Auto-purge failed")
        }
        other => tracing::info!(outcome = other.label(), "Auto-purge finished without purging"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
