//! Import job types for the background CSV import queue
//!
//! `ImportJob` is the immutable unit of work handed from the submission
//! boundary to the worker. `ImportJobStatus` is the queryable projection of
//! its progress and owns the lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ==========================================================================
// Tests First (TDD)
// ==========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> ImportJobStatus {
        ImportJobStatus::pending(Uuid::new_v4(), Some("nasdaq.csv".to_string()), ImportJobType::ListedStocksCsv)
    }

    #[test]
    fn test_pending_status_has_no_timestamps_after_creation() {
        let status = pending();
        assert_eq!(status.status, JobState::Pending);
        assert!(status.started_at.is_none());
        assert!(status.completed_at.is_none());
        assert!(status.total_items.is_none());
        assert_eq!(status.processed_items, 0);
    }

    #[test]
    fn test_full_lifecycle_to_completed() {
        let mut status = pending();
        status.start(Utc::now()).unwrap();
        status.set_total(3).unwrap();
        status.record_processed(2).unwrap();
        status.record_skipped(1).unwrap();
        status.complete(Utc::now()).unwrap();

        assert_eq!(status.status, JobState::Completed);
        assert!(status.completed_at.is_some());
        assert_eq!(status.processed_items, 2);
        assert_eq!(status.skipped_items, 1);
        assert!(status.error.is_none());
    }

    #[test]
    fn test_fail_sets_error_and_completed_at() {
        let mut status = pending();
        status.start(Utc::now()).unwrap();
        status.fail(Utc::now(), "connection reset").unwrap();

        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.error.as_deref(), Some("connection reset"));
        assert!(status.completed_at.is_some());
    }

    #[test]
    fn test_cannot_complete_pending_job() {
        let mut status = pending();
        let err = status.complete(Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::Invalid { from: JobState::Pending, to: JobState::Completed });
        assert!(status.completed_at.is_none());
    }

    #[test]
    fn test_terminal_status_is_frozen() {
        let mut status = pending();
        status.start(Utc::now()).unwrap();
        status.complete(Utc::now()).unwrap();
        let snapshot = status.clone();

        assert!(status.fail(Utc::now(), "late").is_err());
        assert!(status.record_processed(1).is_err());
        assert!(status.set_total(10).is_err());
        assert_eq!(status, snapshot);
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let mut status = pending();
        status.start(Utc::now()).unwrap();
        let first_start = status.started_at;
        assert!(status.start(Utc::now()).is_err());
        assert_eq!(status.started_at, first_start);
    }

    #[test]
    fn test_processed_cannot_exceed_total() {
        let mut status = pending();
        status.start(Utc::now()).unwrap();
        status.set_total(2).unwrap();
        let err = status.record_processed(3).unwrap_err();
        assert_eq!(err, TransitionError::ProcessedExceedsTotal { processed: 3, total: 2 });
        assert_eq!(status.processed_items, 0);
    }

    #[test]
    fn test_progress_percent() {
        let mut status = pending();
        assert_eq!(status.progress_percent(), None);
        status.start(Utc::now()).unwrap();
        status.set_total(4).unwrap();
        status.record_processed(1).unwrap();
        assert_eq!(status.progress_percent(), Some(25));
    }

    #[test]
    fn test_progress_percent_of_empty_file_is_complete() {
        let mut status = pending();
        status.start(Utc::now()).unwrap();
        status.set_total(0).unwrap();
        assert_eq!(status.progress_percent(), Some(100));
    }

    #[test]
    fn test_status_serializes_to_camel_case() {
        let status = pending();
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("createdAt"));
        assert!(json.contains("processedItems"));
        assert!(json.contains("\"jobType\":\"listedStocksCsv\""));
        assert!(!json.contains("created_at"));
    }

    #[test]
    fn test_job_type_names() {
        assert_eq!(ImportJobType::ListedStocksCsv.type_name(), "listed_stocks");
        assert_eq!(ImportJobType::HistoricalPricesCsv.type_name(), "historical_prices");
    }

    #[test]
    fn test_job_constructor_normalizes_symbol() {
        let job = ImportJob::new(b"x".to_vec(), None, ImportJobType::HistoricalPricesCsv, Some(" msft ".to_string()));
        assert!(job.id.is_nil());
        assert_eq!(job.symbol.as_deref(), Some("MSFT"));

        let job = ImportJob::new(b"x".to_vec(), None, ImportJobType::ListedStocksCsv, Some("MSFT".to_string()));
        assert!(job.symbol.is_none());
    }
}

// ==========================================================================
// Job Types
// ==========================================================================

/// Which row-processing strategy a job uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportJobType {
    /// Listed-stock catalog, one row per ticker
    ListedStocksCsv,
    /// Daily OHLCV history for a single symbol
    HistoricalPricesCsv,
}

impl ImportJobType {
    pub fn type_name(&self) -> &'static str {
        match self {
            ImportJobType::ListedStocksCsv => "listed_stocks",
            ImportJobType::HistoricalPricesCsv => "historical_prices",
        }
    }
}

/// A submitted CSV import. Never mutated after it is enqueued.
#[derive(Debug, Clone)]
pub struct ImportJob {
    /// Assigned by the queue when nil
    pub id: Uuid,
    /// Raw CSV payload, decoded as UTF-8 by the worker
    pub content: Vec<u8>,
    /// Original filename, diagnostics only
    pub source_name: Option<String>,
    pub job_type: ImportJobType,
    /// Target instrument for historical price imports
    pub symbol: Option<String>,
}

impl ImportJob {
    pub fn new(
        content: Vec<u8>,
        source_name: Option<String>,
        job_type: ImportJobType,
        symbol: Option<String>,
    ) -> Self {
        let symbol = match job_type {
            ImportJobType::HistoricalPricesCsv => symbol
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty()),
            ImportJobType::ListedStocksCsv => None,
        };

        Self {
            id: Uuid::nil(),
            content,
            source_name,
            job_type,
            symbol,
        }
    }
}

// ==========================================================================
// Job Status
// ==========================================================================

/// Lifecycle state of an import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rejected status mutation; the record is left untouched
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    Invalid { from: JobState, to: JobState },
    #[error("job is {0} and can no longer be updated")]
    NotRunning(JobState),
    #[error("processed items ({processed}) would exceed total items ({total})")]
    ProcessedExceedsTotal { processed: u64, total: u64 },
}

/// Queryable progress record of an import job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJobStatus {
    pub id: Uuid,
    pub status: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Known once the content has been pre-counted
    pub total_items: Option<u64>,
    /// Rows committed to storage so far
    pub processed_items: u64,
    /// Rows dropped by per-row validation
    pub skipped_items: u64,
    pub error: Option<String>,
    pub source_name: Option<String>,
    pub job_type: ImportJobType,
}

impl ImportJobStatus {
    pub fn pending(id: Uuid, source_name: Option<String>, job_type: ImportJobType) -> Self {
        Self {
            id,
            status: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            total_items: None,
            processed_items: 0,
            skipped_items: 0,
            error: None,
            source_name,
            job_type,
        }
    }

    /// Pending -> Running
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != JobState::Pending {
            return Err(TransitionError::Invalid { from: self.status, to: JobState::Running });
        }
        self.status = JobState::Running;
        self.started_at = Some(now);
        Ok(())
    }

    pub fn set_total(&mut self, total: u64) -> Result<(), TransitionError> {
        self.ensure_running()?;
        if self.processed_items > total {
            return Err(TransitionError::ProcessedExceedsTotal {
                processed: self.processed_items,
                total,
            });
        }
        self.total_items = Some(total);
        Ok(())
    }

    pub fn record_processed(&mut self, count: u64) -> Result<(), TransitionError> {
        self.ensure_running()?;
        let processed = self.processed_items + count;
        if let Some(total) = self.total_items {
            if processed > total {
                return Err(TransitionError::ProcessedExceedsTotal { processed, total });
            }
        }
        self.processed_items = processed;
        Ok(())
    }

    pub fn record_skipped(&mut self, count: u64) -> Result<(), TransitionError> {
        self.ensure_running()?;
        self.skipped_items += count;
        Ok(())
    }

    /// Running -> Completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != JobState::Running {
            return Err(TransitionError::Invalid { from: self.status, to: JobState::Completed });
        }
        self.status = JobState::Completed;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Running -> Failed
    pub fn fail(&mut self, now: DateTime<Utc>, error: impl Into<String>) -> Result<(), TransitionError> {
        if self.status != JobState::Running {
            return Err(TransitionError::Invalid { from: self.status, to: JobState::Failed });
        }
        self.status = JobState::Failed;
        self.completed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Percentage of rows committed, once the total is known
    pub fn progress_percent(&self) -> Option<u8> {
        let total = self.total_items?;
        if total == 0 {
            return Some(100);
        }
        Some(((self.processed_items * 100) / total).min(100) as u8)
    }

    fn ensure_running(&self) -> Result<(), TransitionError> {
        if self.status != JobState::Running {
            return Err(TransitionError::NotRunning(self.status));
        }
        Ok(())
    }
}
