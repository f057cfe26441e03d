//! Stock records produced by CSV imports

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Listed-stock catalog entry, keyed by ticker symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedStock {
    pub symbol: String,
    pub name: String,
    pub last_sale: f64,
    pub net_change: f64,
    pub percent_change: f64,
    pub market_cap: f64,
    pub country: Option<String>,
    pub ipo_year: Option<i32>,
    pub volume: i64,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// One trading day of OHLCV data, keyed by (symbol, date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalPrice {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
}

/// A same-type group of rows committed together
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    ListedStocks(Vec<ListedStock>),
    HistoricalPrices {
        symbol: String,
        prices: Vec<HistoricalPrice>,
    },
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::ListedStocks(rows) => rows.len(),
            RecordBatch::HistoricalPrices { prices, .. } => prices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RecordBatch::ListedStocks(_) => "listed_stocks",
            RecordBatch::HistoricalPrices { .. } => "historical_prices",
        }
    }
}
