//! Stock Import Worker - background CSV import pipeline
//!
//! Accepts listed-stock and historical-price CSV imports over NATS, runs them
//! one at a time on a background worker and answers status queries.

mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command, ImportKind};
use crate::config::Config;
use crate::services::import_worker::ImportWorker;
use crate::services::job_queue::JobQueue;
use crate::services::upserter::{create_upserter, BatchUpserter};
use crate::types::{ImportJob, JobState};

const STATUS_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    std::fs::create_dir_all(&config.logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &config.logs_dir, "worker.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,stockimport_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false)) // file
        .init();

    match cli.command {
        Some(Command::Migrate) => migrate(&config).await,
        Some(Command::Import { kind, file, symbol }) => import_file(&config, kind, file, symbol).await,
        Some(Command::Serve) | None => serve(&config).await,
    }
}

async fn migrate(config: &Config) -> Result<()> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    let pool = db::create_pool(database_url).await?;
    db::ensure_schema(&pool).await
}

/// Connect to storage when configured and pick the matching upserter
async fn build_upserter(config: &Config) -> Result<Arc<dyn BatchUpserter>> {
    let pool = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            info!("Connected to PostgreSQL");
            db::ensure_schema(&pool).await?;
            Some(pool)
        }
        None => None,
    };
    Ok(create_upserter(pool))
}

async fn serve(config: &Config) -> Result<()> {
    info!("Starting Stock Import Worker...");

    let upserter = build_upserter(config).await?;
    let queue = Arc::new(JobQueue::new(config.retention_policy()));
    let shutdown = CancellationToken::new();

    let worker = ImportWorker::new(Arc::clone(&queue), upserter, config.worker_settings())
        .spawn(shutdown.clone());

    let janitor_queue = Arc::clone(&queue);
    let janitor_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STATUS_SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = janitor_shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = janitor_queue.evict_expired(chrono::Utc::now());
                    if evicted > 0 {
                        info!("Evicted {} job statuses, {} still tracked", evicted, janitor_queue.tracked());
                    }
                }
            }
        }
    });

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_shutdown.cancel();
    });

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (std::env::var("NATS_USER"), std::env::var("NATS_PASSWORD")) {
        (Ok(user), Ok(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user, password)
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, Arc::clone(&queue), shutdown.clone()).await;

    // Let the in-flight job finish before exiting
    shutdown.cancel();
    if let Err(e) = worker.await {
        error!("Import worker task panicked: {}", e);
    }

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    info!("Stock Import Worker stopped");
    Ok(())
}

/// Run one file through the queue and worker in-process
async fn import_file(config: &Config, kind: ImportKind, file: PathBuf, symbol: Option<String>) -> Result<()> {
    let content = tokio::fs::read(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let source_name = file.file_name().map(|n| n.to_string_lossy().into_owned());

    let upserter = build_upserter(config).await?;
    let queue = Arc::new(JobQueue::new(config.retention_policy()));
    let shutdown = CancellationToken::new();
    let worker = ImportWorker::new(Arc::clone(&queue), upserter, config.worker_settings())
        .spawn(shutdown.clone());

    let job = ImportJob::new(content, source_name, kind.into(), symbol);
    let submitted = handlers::import::submit_job(&queue, job)?;
    info!("Submitted import job {}", submitted.id);

    let mut ticker = tokio::time::interval(Duration::from_millis(100));
    let status = loop {
        ticker.tick().await;
        match queue.status(&submitted.id) {
            Some(status) if status.is_terminal() => break status,
            Some(_) => {}
            None => anyhow::bail!("Status of import job {} disappeared", submitted.id),
        }
    };

    shutdown.cancel();
    worker.await?;

    println!("{}", serde_json::to_string_pretty(&status)?);

    if status.status == JobState::Failed {
        warn!("Import job {} failed", status.id);
        anyhow::bail!(status.error.unwrap_or_else(|| "import failed".to_string()));
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
