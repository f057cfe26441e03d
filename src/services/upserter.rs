//! Batch upsert abstraction
//!
//! The worker hands validated batches to a `BatchUpserter`. Implementations
//! must be idempotent: re-submitting a batch leaves storage in the same
//! state as submitting it once.
//!
//! Backend selection:
//! - `DATABASE_URL` set → `PgUpserter` (one transaction per batch)
//! - otherwise → `InMemoryUpserter` (local runs, tests)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use crate::db::queries;
use crate::types::{HistoricalPrice, ListedStock, RecordBatch};

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("batch rejected: {0}")]
    Rejected(String),
}

/// Storage collaborator for import batches
#[async_trait]
pub trait BatchUpserter: Send + Sync {
    /// Insert-or-update every row of the batch atomically
    async fn upsert_batch(&self, batch: &RecordBatch) -> Result<(), UpsertError>;

    /// Get the name of this backend
    fn name(&self) -> &'static str;
}

/// Pick the backend from configuration
pub fn create_upserter(pool: Option<PgPool>) -> Arc<dyn BatchUpserter> {
    match pool {
        Some(pool) => {
            info!("Using PostgreSQL batch upserter");
            Arc::new(PgUpserter::new(pool))
        }
        None => {
            info!("DATABASE_URL not set, using in-memory batch upserter");
            Arc::new(InMemoryUpserter::new())
        }
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

pub struct PgUpserter {
    pool: PgPool,
}

impl PgUpserter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchUpserter for PgUpserter {
    async fn upsert_batch(&self, batch: &RecordBatch) -> Result<(), UpsertError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;

        match batch {
            RecordBatch::ListedStocks(stocks) => {
                queries::stock::upsert_listed_stocks(&mut tx, stocks).await?;
            }
            RecordBatch::HistoricalPrices { symbol, prices } => {
                queries::stock::upsert_historical_prices(&mut tx, symbol, prices).await?;
            }
        }

        tx.commit().await?;
        debug!("Committed {} batch of {} rows", batch.kind(), batch.len());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
struct MemoryStore {
    listed: HashMap<String, ListedStock>,
    prices: HashMap<(String, NaiveDate), HistoricalPrice>,
    batch_count: u64,
    #[cfg(test)]
    batch_sizes: Vec<usize>,
}

/// Keeps the catalog in process memory
#[derive(Default)]
pub struct InMemoryUpserter {
    store: Mutex<MemoryStore>,
}

impl InMemoryUpserter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listed_stock(&self, symbol: &str) -> Option<ListedStock> {
        self.store.lock().listed.get(symbol).cloned()
    }

    /// Full catalog sorted by symbol
    pub fn listed_stocks(&self) -> Vec<ListedStock> {
        let mut stocks: Vec<ListedStock> = self.store.lock().listed.values().cloned().collect();
        stocks.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        stocks
    }

    /// Price history of one symbol, oldest first
    pub fn prices_for(&self, symbol: &str) -> Vec<HistoricalPrice> {
        let store = self.store.lock();
        let mut prices: Vec<HistoricalPrice> = store
            .prices
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .map(|(_, price)| price.clone())
            .collect();
        prices.sort_by_key(|p| p.date);
        prices
    }

    /// Sizes of every committed batch, in commit order
    #[cfg(test)]
    pub fn committed_batches(&self) -> Vec<usize> {
        self.store.lock().batch_sizes.clone()
    }
}

#[async_trait]
impl BatchUpserter for InMemoryUpserter {
    async fn upsert_batch(&self, batch: &RecordBatch) -> Result<(), UpsertError> {
        let mut store = self.store.lock();

        match batch {
            RecordBatch::ListedStocks(stocks) => {
                for stock in stocks {
                    store.listed.insert(stock.symbol.clone(), stock.clone());
                }
            }
            RecordBatch::HistoricalPrices { symbol, prices } => {
                for price in prices {
                    store.prices.insert((symbol.clone(), price.date), price.clone());
                }
            }
        }
        store.batch_count += 1;
        #[cfg(test)]
        store.batch_sizes.push(batch.len());

        debug!(
            "Stored {} batch of {} rows ({} batches so far)",
            batch.kind(),
            batch.len(),
            store.batch_count
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(symbol: &str, last_sale: f64) -> ListedStock {
        ListedStock {
            symbol: symbol.to_string(),
            name: format!("{} Corp", symbol),
            last_sale,
            net_change: 0.0,
            percent_change: 0.0,
            market_cap: 0.0,
            country: None,
            ipo_year: None,
            volume: 0,
            sector: None,
            industry: None,
        }
    }

    fn price(day: u32, close: f64) -> HistoricalPrice {
        HistoricalPrice {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            close,
            volume: 10,
            open: close,
            high: close,
            low: close,
        }
    }

    #[tokio::test]
    async fn memory_upserter_overwrites_existing_symbol() {
        let upserter = InMemoryUpserter::new();

        upserter.upsert_batch(&RecordBatch::ListedStocks(vec![stock("AAPL", 1.0)])).await.unwrap();
        upserter
            .upsert_batch(&RecordBatch::ListedStocks(vec![stock("AAPL", 2.0), stock("MSFT", 3.0)]))
            .await
            .unwrap();

        assert_eq!(upserter.listed_stock("AAPL").unwrap().last_sale, 2.0);
        assert_eq!(upserter.listed_stocks().len(), 2);
        assert_eq!(upserter.committed_batches(), vec![1, 2]);
    }

    #[tokio::test]
    async fn memory_upserter_keys_prices_by_symbol_and_date() {
        let upserter = InMemoryUpserter::new();
        let batch = RecordBatch::HistoricalPrices {
            symbol: "MSFT".to_string(),
            prices: vec![price(2, 10.0), price(1, 9.0)],
        };

        upserter.upsert_batch(&batch).await.unwrap();
        upserter.upsert_batch(&batch).await.unwrap();

        let history = upserter.prices_for("MSFT");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].close, 9.0);
        assert!(upserter.prices_for("AAPL").is_empty());
    }

    #[test]
    fn memory_upserter_name_is_memory() {
        assert_eq!(InMemoryUpserter::new().name(), "memory");
    }
}
