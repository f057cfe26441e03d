//! Import submission and status handlers
//!
//! The submission boundary validates requests before anything touches the
//! queue: empty content or a historical import without a symbol never
//! becomes a job.

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use base64::Engine;
use futures::StreamExt;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use crate::services::job_queue::JobQueue;
use crate::types::{
    ErrorResponse, ImportJob, ImportJobStatus, ImportJobType, JobStatusRequest, Request,
    SubmitImportRequest, SuccessResponse,
};

/// Submission rejected before enqueue
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("jobType is required")]
    MissingJobType,
    #[error("import content is empty")]
    EmptyContent,
    #[error("historical price imports require a symbol")]
    MissingSymbol,
    #[error("contentBase64 is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

impl SubmitError {
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::MissingJobType => "MISSING_JOB_TYPE",
            SubmitError::EmptyContent => "EMPTY_CONTENT",
            SubmitError::MissingSymbol => "MISSING_SYMBOL",
            SubmitError::InvalidBase64(_) => "INVALID_CONTENT",
        }
    }
}

/// Validate a submission and enqueue it
pub fn submit_import(queue: &JobQueue, request: SubmitImportRequest) -> Result<ImportJobStatus, SubmitError> {
    let job_type = request.job_type.ok_or(SubmitError::MissingJobType)?;

    let content = match (request.content_base64, request.content) {
        (Some(encoded), _) => base64::engine::general_purpose::STANDARD.decode(encoded.trim())?,
        (None, Some(text)) => text.into_bytes(),
        (None, None) => return Err(SubmitError::EmptyContent),
    };

    submit_job(queue, ImportJob::new(content, request.filename, job_type, request.symbol))
}

/// Enqueue an already-built job after the boundary checks
pub fn submit_job(queue: &JobQueue, job: ImportJob) -> Result<ImportJobStatus, SubmitError> {
    if job.content.iter().all(u8::is_ascii_whitespace) {
        return Err(SubmitError::EmptyContent);
    }
    if job.job_type == ImportJobType::HistoricalPricesCsv && job.symbol.is_none() {
        return Err(SubmitError::MissingSymbol);
    }

    Ok(queue.enqueue(job))
}

/// Handle stockimport.import.submit requests
pub async fn handle_import_submit(
    client: Client,
    mut subscriber: Subscriber,
    queue: Arc<JobQueue>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<SubmitImportRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import submit request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match submit_import(&queue, request.payload) {
            Ok(status) => {
                let success = SuccessResponse::new(request.id, status);
                let _ = client.publish(reply, serde_json::to_vec(&success)?.into()).await;
            }
            Err(e) => {
                warn!("Rejected import submission {}: {}", request.id, e);
                let error = ErrorResponse::new(request.id, e.code(), e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle stockimport.import.status requests
pub async fn handle_import_status(
    client: Client,
    mut subscriber: Subscriber,
    queue: Arc<JobQueue>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        let reply = match msg.reply {
            Some(ref r) => r.clone(),
            None => continue,
        };

        let request: Request<JobStatusRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse import status request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let job_id = request.payload.job_id;
        let payload = match queue.status(&job_id) {
            Some(status) => serde_json::to_vec(&SuccessResponse::new(request.id, status))?,
            None => serde_json::to_vec(&ErrorResponse::new(
                request.id,
                "NOT_FOUND",
                format!("Import job {} not found", job_id),
            ))?,
        };
        let _ = client.publish(reply, payload.into()).await;
    }

    Ok(())
}
