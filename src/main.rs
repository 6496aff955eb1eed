use std::{path::PathBuf, process::ExitCode, sync::Arc};

use chrono::NaiveDate;
use clap::Parser;
use recordkeeper::{
    config::AppConfig,
    db::DbPool,
    jobs,
    lifecycle::LifecycleService,
    models::RecordStage,
    observability,
    retention::{RetentionEngine, RetentionError},
};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(version, about = "Clinical visit record retention engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./recordkeeper.toml if it exists,
    /// otherwise an in-memory configuration)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Run migrations, then the daily schedule until interrupted (default)
    Serve,
    /// Evaluate every active visit once and exit
    Scan,
    /// Run the batch expiration check once and exit
    Batch,
    /// Evaluate a single visit
    Process {
        /// Visit ID
        visit_id: i64,
    },
    /// Show record totals per lifecycle stage
    Stats,
    /// Open a retention or destruction record for a visit
    Open {
        /// Stage to open (`retention` or `destruction`)
        stage: RecordStage,
        /// Visit ID
        visit_id: i64,
    },
    /// Mark a pending stage record done
    Complete {
        /// Stage to complete (`transfer`, `retention` or `destruction`)
        stage: RecordStage,
        /// Visit ID
        visit_id: i64,
        /// Report date (YYYY-MM-DD)
        report_date: NaiveDate,
    },
    /// Run database migrations and exit
    Migrate,
    /// Export the JSON schema for the configuration file
    Schema {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,
    },
}

const DEFAULT_CONFIG_FILE: &str = "recordkeeper.toml";

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let command = match args.command.unwrap_or(Command::Serve) {
        Command::Schema { output } => return run_schema_export(output),
        command => command,
    };

    let (config, config_path) = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    match &config_path {
        Some(path) => tracing::info!(config_file = %path.display(), "Loaded configuration"),
        None => tracing::info!("No config file found, using defaults"),
    }

    if matches!(command, Command::Serve)
        && let Err(e) = observability::metrics::init_metrics(&config.observability.metrics)
    {
        tracing::error!(error = %e, "Failed to initialize metrics");
        return ExitCode::FAILURE;
    }

    let db = match DbPool::from_config(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to database");
            return ExitCode::FAILURE;
        }
    };

    if (matches!(command, Command::Migrate) || config.database.run_migrations())
        && let Err(e) = db.run_migrations().await
    {
        tracing::error!(error = %e, "Database migrations failed");
        return ExitCode::FAILURE;
    }

    match command {
        Command::Serve => run_server(db, config).await,
        Command::Scan => run_scan(db, config).await,
        Command::Batch => run_batch(db, config).await,
        Command::Process { visit_id } => run_process(db, config, visit_id).await,
        Command::Stats => run_stats(&db).await,
        Command::Open { stage, visit_id } => run_open(&db, stage, visit_id).await,
        Command::Complete {
            stage,
            visit_id,
            report_date,
        } => run_complete(&db, stage, visit_id, report_date).await,
        Command::Migrate => {
            tracing::info!("Database migrations completed successfully");
            ExitCode::SUCCESS
        }
        Command::Schema { .. } => ExitCode::SUCCESS,
    }
}

/// Load the explicit config file, or `./recordkeeper.toml` when present, or
/// fall back to defaults.
fn load_config(explicit: Option<&str>) -> Result<(AppConfig, Option<PathBuf>), String> {
    let path = match explicit {
        Some(p) => PathBuf::from(p),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok((AppConfig::default(), None));
            }
            default
        }
    };

    AppConfig::from_file(&path)
        .map(|config| (config, Some(path.clone())))
        .map_err(|e| format!("Failed to load config from {}: {}", path.display(), e))
}

fn run_schema_export(output: Option<String>) -> ExitCode {
    #[cfg(feature = "json-schema")]
    {
        let content = match AppConfig::json_schema_string() {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };
        match output {
            Some(path) => {
                if let Err(e) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write to {}: {}", path, e);
                    return ExitCode::FAILURE;
                }
                eprintln!("Config JSON schema written to {}", path);
            }
            None => println!("{}", content),
        }
        ExitCode::SUCCESS
    }
    #[cfg(not(feature = "json-schema"))]
    {
        let _ = output;
        eprintln!("Error: JSON schema export requires the 'json-schema' feature");
        ExitCode::FAILURE
    }
}

/// Run the daily schedule until SIGINT/SIGTERM.
async fn run_server(db: DbPool, config: AppConfig) -> ExitCode {
    if let Err(e) = db.health_check().await {
        tracing::error!(error = %e, "Database health check failed");
        return ExitCode::FAILURE;
    }

    let engine = Arc::new(RetentionEngine::new(&db, config.retention.clone()));
    let cancel = CancellationToken::new();

    let schedule = tokio::spawn(jobs::start_retention_schedule(
        Arc::clone(&engine),
        config.scheduler.clone(),
        cancel.clone(),
    ));

    shutdown_signal(cancel).await;

    match tokio::time::timeout(std::time::Duration::from_secs(30), schedule).await {
        Ok(Ok(())) => {
            tracing::info!("Retention schedule stopped");
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Retention schedule task failed");
            ExitCode::FAILURE
        }
        Err(_) => {
            tracing::warn!("Timeout waiting for the in-flight retention run");
            ExitCode::FAILURE
        }
    }
}

/// Cancel `cancel` on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, stopping after the current run...");
    cancel.cancel();
}

/// Cancel on Ctrl+C for the one-shot commands.
fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));
    cancel
}

fn report_failure(e: &RetentionError) -> ExitCode {
    tracing::error!(kind = e.kind().as_str(), failures = e.leaf_count(), error = %e, "Run failed");
    ExitCode::FAILURE
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => tracing::warn!(error = %e, "Failed to serialize report"),
    }
}

async fn run_scan(db: DbPool, config: AppConfig) -> ExitCode {
    let engine = RetentionEngine::new(&db, config.retention);
    match engine.run_full_scan(&cancel_on_signal()).await {
        Ok(report) => {
            print_json(&report);
            if report.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => report_failure(&e),
    }
}

async fn run_batch(db: DbPool, config: AppConfig) -> ExitCode {
    let engine = RetentionEngine::new(&db, config.retention);
    match engine.run_batch_scan(&cancel_on_signal()).await {
        Ok(report) => {
            print_json(&report);
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

async fn run_process(db: DbPool, config: AppConfig, visit_id: i64) -> ExitCode {
    let engine = RetentionEngine::new(&db, config.retention);
    match engine.process_one(visit_id).await {
        Ok(transition) => {
            tracing::info!(visit_id, ?transition, "Visit processed");
            ExitCode::SUCCESS
        }
        Err(e) => report_failure(&e),
    }
}

async fn run_stats(db: &DbPool) -> ExitCode {
    let service = LifecycleService::new(db);
    for stage in [
        RecordStage::Transfer,
        RecordStage::Retention,
        RecordStage::Destruction,
    ] {
        match service.stats(stage).await {
            Ok(stats) => println!(
                "{:<12} total={} pending={} done={}",
                stage, stats.total, stats.pending, stats.done
            ),
            Err(e) => {
                tracing::error!(%stage, error = %e, "Failed to read stats");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

async fn run_open(db: &DbPool, stage: RecordStage, visit_id: i64) -> ExitCode {
    let service = LifecycleService::new(db);
    let result = match stage {
        RecordStage::Retention => service.open_retention(visit_id).await,
        RecordStage::Destruction => service.open_destruction(visit_id).await,
        RecordStage::Transfer => {
            tracing::error!(visit_id, "Transfer records are opened by the retention engine");
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(record) => {
            tracing::info!(visit_id, %stage, status = record.status.as_str(), "Stage record opened");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(visit_id, %stage, error = %e, "Failed to open stage record");
            ExitCode::FAILURE
        }
    }
}

async fn run_complete(
    db: &DbPool,
    stage: RecordStage,
    visit_id: i64,
    report_date: NaiveDate,
) -> ExitCode {
    let service = LifecycleService::new(db);
    let result = match stage {
        RecordStage::Transfer => service.complete_transfer(visit_id, report_date).await,
        RecordStage::Retention => service.complete_retention(visit_id, report_date).await,
        RecordStage::Destruction => service.complete_destruction(visit_id, report_date).await,
    };

    match result {
        Ok(_) => {
            tracing::info!(visit_id, %stage, %report_date, "Stage record completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(visit_id, %stage, error = %e, "Failed to complete stage record");
            ExitCode::FAILURE
        }
    }
}
