//! Background CSV import worker
//!
//! One long-lived task pulls jobs from the `JobQueue` strictly in submission
//! order and runs each to completion before taking the next one:
//!
//! 1. `Pending -> Running`, total row count pre-computed
//! 2. lines streamed through the tokenizer and the job's `RowStrategy`
//! 3. valid rows grouped into fixed-size batches and upserted in file order
//! 4. `Running -> Completed`, or `Running -> Failed` on a fatal error
//!
//! Invalid rows are skipped and counted; they never fail the job.
//! Shutdown is only observed between jobs, so an in-flight job always finishes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::services::csv_row::split_line;
use crate::services::job_queue::{JobQueue, StatusUpdateError};
use crate::services::row_strategy::{push_row, RowStrategy};
use crate::services::upserter::{BatchUpserter, UpsertError};
use crate::types::{ImportJob, ImportJobStatus, RecordBatch};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Reasons a job ends up `Failed`
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("content is not valid UTF-8 text: {0}")]
    InvalidEncoding(#[from] std::str::Utf8Error),
    #[error("historical price import requires a symbol")]
    MissingSymbol,
    #[error("batch {batch} failed after {attempts} attempt(s): {source}")]
    Upsert {
        batch: usize,
        attempts: u32,
        #[source]
        source: UpsertError,
    },
    #[error("status update rejected: {0}")]
    Status(#[from] StatusUpdateError),
}

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    /// Rows per upsert call
    pub batch_size: usize,
    /// Extra attempts for a failed batch before the job fails
    pub batch_retries: u32,
    /// Delay before retry N is `retry_backoff * N`
    pub retry_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: 500,
            batch_retries: 2,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ImportSummary {
    processed: u64,
    skipped: u64,
    batches: usize,
}

pub struct ImportWorker {
    queue: Arc<JobQueue>,
    upserter: Arc<dyn BatchUpserter>,
    settings: WorkerSettings,
}

impl ImportWorker {
    pub fn new(queue: Arc<JobQueue>, upserter: Arc<dyn BatchUpserter>, settings: WorkerSettings) -> Self {
        Self {
            queue,
            upserter,
            settings: WorkerSettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
        }
    }

    /// Start the worker loop on its own task
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            "Import worker started (backend: {}, batch size: {}, retries: {})",
            self.upserter.name(),
            self.settings.batch_size,
            self.settings.batch_retries
        );

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                job = self.queue.dequeue() => job,
            };

            let Some(job) = next else {
                warn!("Import queue closed, stopping worker");
                break;
            };

            self.process_job(job).await;
            self.queue.evict_expired(Utc::now());
        }

        info!("Import worker stopped ({} jobs still queued)", self.queue.pending());
    }

    /// Run one job to a terminal state and return the final status
    pub async fn process_job(&self, job: ImportJob) -> Option<ImportJobStatus> {
        let job_id = job.id;
        let start_time = Instant::now();

        if let Err(e) = self.queue.update_status(&job_id, |s| s.start(Utc::now())) {
            error!("Cannot start import job {}: {}", job_id, e);
            return None;
        }

        info!(
            "Processing import job {} ({}) from '{}'",
            job_id,
            job.job_type.type_name(),
            job.source_name.as_deref().unwrap_or("<unnamed>")
        );

        let outcome = self.import(&job).await;
        let duration_ms = start_time.elapsed().as_millis();

        let finished = match outcome {
            Ok(summary) => {
                info!(
                    "Import job {} completed in {}ms: {} rows in {} batches, {} skipped",
                    job_id, duration_ms, summary.processed, summary.batches, summary.skipped
                );
                self.queue.update_status(&job_id, |s| s.complete(Utc::now()))
            }
            Err(e) => {
                warn!("Import job {} failed after {}ms: {}", job_id, duration_ms, e);
                let message = e.to_string();
                self.queue.update_status(&job_id, |s| s.fail(Utc::now(), message))
            }
        };

        match finished {
            Ok(status) => Some(status),
            Err(e) => {
                error!("Failed to finalize import job {}: {}", job_id, e);
                self.queue.status(&job_id)
            }
        }
    }

    async fn import(&self, job: &ImportJob) -> Result<ImportSummary, ImportError> {
        let strategy = RowStrategy::for_job(job.job_type, job.symbol.as_deref())
            .ok_or(ImportError::MissingSymbol)?;
        let text = std::str::from_utf8(&job.content)?;
        let text = text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text);

        let total = count_data_rows(text, &strategy);
        self.queue.update_status(&job.id, |s| s.set_total(total))?;
        debug!("Import job {} has {} data rows", job.id, total);

        let mut summary = ImportSummary::default();
        let capacity = self.settings.batch_size.min(total as usize);
        let mut batch = strategy.empty_batch(capacity);
        let mut skipped_unflushed = 0u64;
        let mut seen_first_line = false;

        for (line_no, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let fields = split_line(line);
            if !seen_first_line {
                seen_first_line = true;
                if strategy.is_header(&fields) {
                    continue;
                }
            }

            if let Err(e) = push_row(&mut batch, &fields) {
                debug!("Import job {}: skipping line {}: {}", job.id, line_no + 1, e);
                skipped_unflushed += 1;
            }

            if batch.len() >= self.settings.batch_size {
                let full = std::mem::replace(&mut batch, strategy.empty_batch(capacity));
                self.commit(job, full, &mut skipped_unflushed, &mut summary).await?;
            }
        }

        if !batch.is_empty() || skipped_unflushed > 0 {
            self.commit(job, batch, &mut skipped_unflushed, &mut summary).await?;
        }

        Ok(summary)
    }

    /// Upsert the pending rows, then publish progress
    async fn commit(
        &self,
        job: &ImportJob,
        batch: RecordBatch,
        skipped: &mut u64,
        summary: &mut ImportSummary,
    ) -> Result<(), ImportError> {
        let committed = batch.len() as u64;

        if committed > 0 {
            summary.batches += 1;
            self.upsert_with_retry(&batch, summary.batches).await?;
        }

        let newly_skipped = std::mem::take(skipped);
        let status = self.queue.update_status(&job.id, |s| {
            s.record_processed(committed)?;
            s.record_skipped(newly_skipped)
        })?;

        summary.processed += committed;
        summary.skipped += newly_skipped;
        debug!(
            "Import job {}: batch {} committed, {}/{} rows ({}%)",
            job.id,
            summary.batches,
            status.processed_items,
            status.total_items.unwrap_or_default(),
            status.progress_percent().unwrap_or_default()
        );
        Ok(())
    }

    async fn upsert_with_retry(
        &self,
        batch: &RecordBatch,
        batch_no: usize,
    ) -> Result<(), ImportError> {
        let max_attempts = self.settings.batch_retries + 1;
        let mut attempt = 1;

        loop {
            match self.upserter.upsert_batch(batch).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < max_attempts => {
                    warn!(
                        "Batch {} upsert failed (attempt {}/{}): {}",
                        batch_no, attempt, max_attempts, e
                    );
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(ImportError::Upsert {
                        batch: batch_no,
                        attempts: attempt,
                        source,
                    })
                }
            }
        }
    }
}

/// Non-blank lines, minus a leading header
fn count_data_rows(text: &str, strategy: &RowStrategy) -> u64 {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let Some(first) = lines.next() else {
        return 0;
    };
    let first_is_data = !strategy.is_header(&split_line(first));
    lines.count() as u64 + u64::from(first_is_data)
}
