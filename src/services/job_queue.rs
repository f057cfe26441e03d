//! In-memory import job queue with status registry
//!
//! Producers call `enqueue` from any task; a single worker calls `dequeue`.
//! The backlog is an unbounded FIFO channel whose receiver sits behind an
//! async mutex, so even with several consumers no job is delivered twice.
//! Status records live in a map guarded by an `RwLock`; every mutation goes
//! through `update_status` so readers never observe a half-written record.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::types::{ImportJob, ImportJobStatus, TransitionError};

/// How long finished statuses stay queryable
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Terminal statuses older than this (by completion time) are evicted
    pub max_age: Duration,
    /// Upper bound on retained terminal statuses; oldest completions go first
    pub max_entries: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(24),
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusUpdateError {
    #[error("no status tracked for job {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

pub struct JobQueue {
    sender: mpsc::UnboundedSender<ImportJob>,
    receiver: Mutex<mpsc::UnboundedReceiver<ImportJob>>,
    statuses: RwLock<HashMap<Uuid, ImportJobStatus>>,
    pending: AtomicUsize,
    retention: RetentionPolicy,
}

impl JobQueue {
    pub fn new(retention: RetentionPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            statuses: RwLock::new(HashMap::new()),
            pending: AtomicUsize::new(0),
            retention,
        }
    }

    /// Register a job as pending and append it to the backlog.
    ///
    /// Returns immediately with a snapshot of the new status.
    pub fn enqueue(&self, mut job: ImportJob) -> ImportJobStatus {
        if job.id.is_nil() {
            job.id = Uuid::new_v4();
        }

        let status = ImportJobStatus::pending(job.id, job.source_name.clone(), job.job_type);
        // Status must exist before the worker can see the job
        self.statuses.write().insert(job.id, status.clone());
        let position = self.pending.fetch_add(1, Ordering::SeqCst) + 1;

        let job_id = job.id;
        let job_type = job.job_type;
        if let Err(e) = self.sender.send(job) {
            // Receiver lives as long as the queue, so this only happens while tearing down
            error!("Failed to enqueue import job {}: {}", job_id, e);
            self.pending.fetch_sub(1, Ordering::SeqCst);
        } else {
            info!(
                "Import job {} ({}) queued at position {}",
                job_id,
                job_type.type_name(),
                position
            );
        }

        status
    }

    /// Wait for the next job in submission order.
    ///
    /// Cancel-safe: dropping the future never loses a job.
    pub async fn dequeue(&self) -> Option<ImportJob> {
        let mut receiver = self.receiver.lock().await;
        let job = receiver.recv().await;
        if job.is_some() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        job
    }

    /// Snapshot of a job's status; `None` for unknown or evicted ids
    pub fn status(&self, id: &Uuid) -> Option<ImportJobStatus> {
        self.statuses.read().get(id).cloned()
    }

    /// Apply a mutation to a status record under the write lock and return
    /// the updated snapshot.
    pub fn update_status<F>(&self, id: &Uuid, update: F) -> Result<ImportJobStatus, StatusUpdateError>
    where
        F: FnOnce(&mut ImportJobStatus) -> Result<(), TransitionError>,
    {
        let mut statuses = self.statuses.write();
        let status = statuses.get_mut(id).ok_or(StatusUpdateError::NotFound(*id))?;
        update(status)?;
        Ok(status.clone())
    }

    /// Jobs waiting in the backlog
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Number of status records currently queryable
    pub fn tracked(&self) -> usize {
        self.statuses.read().len()
    }

    /// Drop finished statuses per the retention policy. Pending and running
    /// records are never evicted. Returns how many records were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut statuses = self.statuses.write();
        let before = statuses.len();
        let cutoff = now - self.retention.max_age;

        statuses.retain(|_, status| match status.completed_at {
            Some(completed_at) if status.is_terminal() => completed_at > cutoff,
            _ => true,
        });

        let mut finished: Vec<(DateTime<Utc>, Uuid)> = statuses
            .values()
            .filter(|s| s.is_terminal())
            .filter_map(|s| s.completed_at.map(|at| (at, s.id)))
            .collect();

        if finished.len() > self.retention.max_entries {
            finished.sort();
            let excess = finished.len() - self.retention.max_entries;
            for (_, id) in finished.into_iter().take(excess) {
                statuses.remove(&id);
            }
        }

        let evicted = before - statuses.len();
        if evicted > 0 {
            debug!("Evicted {} finished import job statuses", evicted);
        }
        evicted
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}
