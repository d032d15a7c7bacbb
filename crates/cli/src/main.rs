//! Jira intake entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration** from the environment (and `.env`), aborting on
//!    any invalid value.
//! 2. **Wire observability**: `tracing-subscriber` with JSON or pretty output,
//!    an optional OpenTelemetry OTLP exporter, and an optional Prometheus
//!    scrape endpoint for the handler's counters.
//! 3. **Construct infrastructure**: the SQLite issue store and dispatch queue
//!    sharing one database, and the Docker task launcher.
//! 4. **Serve** `POST /ingest` and `GET /hello` until Ctrl-C or SIGTERM.

mod config;
mod observability;

use std::sync::Arc;

use anyhow::Context;
use launcher::DockerTaskLauncher;
use router::{FacadeMetrics, IngestionHandler};
use store::{Database, SqliteDispatchQueue, SqliteIssueStore};
use tracing::info;

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Invalid configuration")?;
    let _tracing = observability::init_tracing(config.log_format, config.otlp_endpoint.as_deref());

    if let Some(addr) = config.metrics_addr {
        observability::init_metrics(addr).context("Failed to start metrics endpoint")?;
    }

    let db = match &config.database_path {
        Some(path) => Database::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?,
        None => Database::open_in_memory().context("Failed to open in-memory database")?,
    };
    let store = SqliteIssueStore::open(db.clone(), &config.issue_table)
        .await
        .context("Failed to initialise issue store")?;
    let queue = SqliteDispatchQueue::open(db, &config.queue_name)
        .await
        .context("Failed to initialise dispatch queue")?;
    let launcher = DockerTaskLauncher::connect(config.launcher.clone())
        .context("Failed to configure Docker client")?;

    info!(
        service = observability::SERVICE_NAME,
        table = store.table(),
        queue = queue.name(),
        image = %config.launcher.image,
        "Starting"
    );

    let handler = IngestionHandler::new(
        Arc::new(store),
        Arc::new(queue),
        Arc::new(launcher),
        Arc::new(FacadeMetrics),
    )
    .with_status_policy(config.status_policy);

    listener::serve(&config.server, Arc::new(handler)).await?;
    Ok(())
}
