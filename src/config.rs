//! Configuration management

use std::time::Duration;

use anyhow::{self, Context, Result};

use crate::services::import_worker::WorkerSettings;
use crate::services::job_queue::RetentionPolicy;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// PostgreSQL connection string (in-memory store when unset)
    pub database_url: Option<String>,

    /// Rows per upsert batch
    pub batch_size: usize,

    /// Extra attempts for a failed batch
    pub batch_retries: u32,

    /// Base delay between batch retries
    pub retry_backoff_ms: u64,

    /// How long finished job statuses remain queryable
    pub status_retention_hours: i64,

    /// Upper bound on retained finished job statuses
    pub max_retained_statuses: usize,

    /// Directory for rolling log files
    pub logs_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let batch_size = env_or("IMPORT_BATCH_SIZE", 500)?;
        let batch_retries = env_or("IMPORT_BATCH_RETRIES", 2)?;
        let retry_backoff_ms = env_or("IMPORT_RETRY_BACKOFF_MS", 250)?;
        let status_retention_hours = env_or("STATUS_RETENTION_HOURS", 24)?;
        let max_retained_statuses = env_or("MAX_RETAINED_STATUSES", 10_000)?;

        let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());

        let config = Self {
            nats_url,
            database_url,
            batch_size,
            batch_retries,
            retry_backoff_ms,
            status_retention_hours,
            max_retained_statuses,
            logs_dir,
        };
        config.validate()?;
        Ok(config)
    }

    /// Batch size, retention age and status cap must all be positive
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("IMPORT_BATCH_SIZE must be greater than zero");
        }
        if self.status_retention_hours <= 0 {
            anyhow::bail!(
                "STATUS_RETENTION_HOURS must be greater than zero, got {}",
                self.status_retention_hours
            );
        }
        if self.max_retained_statuses == 0 {
            anyhow::bail!("MAX_RETAINED_STATUSES must be greater than zero");
        }
        Ok(())
    }

    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            batch_size: self.batch_size,
            batch_retries: self.batch_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            max_age: chrono::Duration::hours(self.status_retention_hours),
            max_entries: self.max_retained_statuses,
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when unset
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_uses_default_when_unset() {
        std::env::remove_var("STOCKIMPORT_TEST_UNSET");
        let value: usize = env_or("STOCKIMPORT_TEST_UNSET", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_env_or_parses_value() {
        std::env::set_var("STOCKIMPORT_TEST_BATCH", " 250 ");
        let value: usize = env_or("STOCKIMPORT_TEST_BATCH", 500).unwrap();
        assert_eq!(value, 250);
        std::env::remove_var("STOCKIMPORT_TEST_BATCH");
    }

    #[test]
    fn test_env_or_rejects_garbage() {
        std::env::set_var("STOCKIMPORT_TEST_GARBAGE", "lots");
        let err = env_or::<u32>("STOCKIMPORT_TEST_GARBAGE", 1).unwrap_err();
        assert!(err.to_string().contains("STOCKIMPORT_TEST_GARBAGE"));
        std::env::remove_var("STOCKIMPORT_TEST_GARBAGE");
    }

    fn sample_config() -> Config {
        Config {
            nats_url: "nats://localhost:4222".to_string(),
            database_url: None,
            batch_size: 100,
            batch_retries: 1,
            retry_backoff_ms: 10,
            status_retention_hours: 2,
            max_retained_statuses: 5,
            logs_dir: "./logs".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_sample_config() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config { batch_size: 0, ..sample_config() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("IMPORT_BATCH_SIZE"));
    }

    #[test]
    fn test_validate_rejects_non_positive_retention_hours() {
        for hours in [0, -1] {
            let config = Config { status_retention_hours: hours, ..sample_config() };
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("STATUS_RETENTION_HOURS"));
        }
    }

    #[test]
    fn test_validate_rejects_zero_status_cap() {
        let config = Config { max_retained_statuses: 0, ..sample_config() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("MAX_RETAINED_STATUSES"));
    }

    #[test]
    fn test_settings_derived_from_config() {
        let config = sample_config();

        let settings = config.worker_settings();
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.retry_backoff, Duration::from_millis(10));

        let retention = config.retention_policy();
        assert_eq!(retention.max_age, chrono::Duration::hours(2));
        assert_eq!(retention.max_entries, 5);
    }
}
