//! Per-job-type row mapping
//!
//! Each `ImportJobType` maps to a `RowStrategy` that knows its header
//! keyword and which kind of `RecordBatch` it fills. Rows are parsed
//! straight into that batch, so a batch only ever holds one record kind.

use chrono::NaiveDate;
use thiserror::Error;

use crate::services::csv_row::{
    optional_string, parse_count, parse_decimal, parse_optional_int, parse_percentage,
};
use crate::types::{HistoricalPrice, ImportJobType, ListedStock, RecordBatch};

/// Why a single row was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("unparsable date '{0}'")]
    InvalidDate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStrategy {
    ListedStocks,
    HistoricalPrices { symbol: String },
}

impl RowStrategy {
    pub fn for_job(job_type: ImportJobType, symbol: Option<&str>) -> Option<Self> {
        match job_type {
            ImportJobType::ListedStocksCsv => Some(RowStrategy::ListedStocks),
            ImportJobType::HistoricalPricesCsv => symbol.map(|s| RowStrategy::HistoricalPrices {
                symbol: s.to_string(),
            }),
        }
    }

    /// First token of a header line for this layout
    pub fn header_keyword(&self) -> &'static str {
        match self {
            RowStrategy::ListedStocks => "symbol",
            RowStrategy::HistoricalPrices { .. } => "date",
        }
    }

    pub fn is_header(&self, fields: &[String]) -> bool {
        fields
            .first()
            .map(|first| first.trim().eq_ignore_ascii_case(self.header_keyword()))
            .unwrap_or(false)
    }

    /// Empty batch of the record kind this strategy produces
    pub fn empty_batch(&self, capacity: usize) -> RecordBatch {
        match self {
            RowStrategy::ListedStocks => RecordBatch::ListedStocks(Vec::with_capacity(capacity)),
            RowStrategy::HistoricalPrices { symbol } => RecordBatch::HistoricalPrices {
                symbol: symbol.clone(),
                prices: Vec::with_capacity(capacity),
            },
        }
    }
}

/// Parse one row with the layout of the batch's record kind and append it.
/// A rejected row leaves the batch unchanged.
pub fn push_row(batch: &mut RecordBatch, fields: &[String]) -> Result<(), RowError> {
    match batch {
        RecordBatch::ListedStocks(stocks) => stocks.push(parse_listed_stock(fields)?),
        RecordBatch::HistoricalPrices { prices, .. } => prices.push(parse_historical_price(fields)?),
    }
    Ok(())
}

fn field(fields: &[String], index: usize) -> &str {
    fields.get(index).map(String::as_str).unwrap_or("")
}

/// `Symbol,Name,Last Sale,Net Change,% Change,Market Cap,Country,IPO Year,Volume,Sector,Industry`
fn parse_listed_stock(fields: &[String]) -> Result<ListedStock, RowError> {
    let symbol = optional_string(field(fields, 0)).ok_or(RowError::MissingField("symbol"))?;
    let name = optional_string(field(fields, 1)).ok_or(RowError::MissingField("name"))?;

    Ok(ListedStock {
        symbol: symbol.to_uppercase(),
        name,
        last_sale: parse_decimal(field(fields, 2)),
        net_change: parse_decimal(field(fields, 3)),
        percent_change: parse_percentage(field(fields, 4)),
        market_cap: parse_decimal(field(fields, 5)),
        country: optional_string(field(fields, 6)),
        ipo_year: parse_optional_int(field(fields, 7)),
        volume: parse_count(field(fields, 8)),
        sector: optional_string(field(fields, 9)),
        industry: optional_string(field(fields, 10)),
    })
}

/// `Date,Close/Last,Volume,Open,High,Low`
fn parse_historical_price(fields: &[String]) -> Result<HistoricalPrice, RowError> {
    let raw_date = optional_string(field(fields, 0)).ok_or(RowError::MissingField("date"))?;
    let date = parse_trade_date(&raw_date).ok_or(RowError::InvalidDate(raw_date))?;

    Ok(HistoricalPrice {
        date,
        close: parse_decimal(field(fields, 1)),
        volume: parse_count(field(fields, 2)),
        open: parse_decimal(field(fields, 3)),
        high: parse_decimal(field(fields, 4)),
        low: parse_decimal(field(fields, 5)),
    })
}

fn parse_trade_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}
