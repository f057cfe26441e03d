//! NATS message handlers

pub mod import;

use std::sync::Arc;

use anyhow::Result;
use async_nats::Client;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::services::job_queue::JobQueue;

pub const IMPORT_SUBMIT_SUBJECT: &str = "stockimport.import.submit";
pub const IMPORT_STATUS_SUBJECT: &str = "stockimport.import.status";

/// Subscribe to the import subjects and serve them until shutdown
pub async fn start_handlers(
    client: Client,
    queue: Arc<JobQueue>,
    shutdown: CancellationToken,
) -> Result<()> {
    let submit_sub = client.subscribe(IMPORT_SUBMIT_SUBJECT).await?;
    let status_sub = client.subscribe(IMPORT_STATUS_SUBJECT).await?;
    info!("Subscribed to NATS subjects");

    let client_submit = client.clone();
    let queue_submit = Arc::clone(&queue);
    let submit_handle = tokio::spawn(async move {
        import::handle_import_submit(client_submit, submit_sub, queue_submit).await
    });

    let client_status = client.clone();
    let queue_status = Arc::clone(&queue);
    let status_handle = tokio::spawn(async move {
        import::handle_import_status(client_status, status_sub, queue_status).await
    });

    info!("All handlers started, waiting for messages...");

    select! {
        _ = shutdown.cancelled() => {
            info!("Shutdown requested, stopping handlers");
        }
        result = submit_handle => {
            if let Ok(Err(e)) = result {
                error!("Import submit handler error: {}", e);
            }
        }
        result = status_handle => {
            if let Ok(Err(e)) = result {
                error!("Import status handler error: {}", e);
            }
        }
    }

    Ok(())
}
