//! Upsert queries for the `listed_stocks` and `historical_prices` tables.
//!
//! Both take an open transaction so a whole batch commits or rolls back together.

use sqlx::{Postgres, Transaction};

use crate::types::{HistoricalPrice, ListedStock};

/// UPSERT catalog rows keyed by symbol. Last write wins.
pub async fn upsert_listed_stocks(
    tx: &mut Transaction<'_, Postgres>,
    stocks: &[ListedStock],
) -> Result<(), sqlx::Error> {
    for stock in stocks {
        sqlx::query(
            r#"
            INSERT INTO listed_stocks (
                symbol, name, last_sale, net_change, percent_change, market_cap,
                country, ipo_year, volume, sector, industry
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (symbol) DO UPDATE
                SET name           = EXCLUDED.name,
                    last_sale      = EXCLUDED.last_sale,
                    net_change     = EXCLUDED.net_change,
                    percent_change = EXCLUDED.percent_change,
                    market_cap     = EXCLUDED.market_cap,
                    country        = EXCLUDED.country,
                    ipo_year       = EXCLUDED.ipo_year,
                    volume         = EXCLUDED.volume,
                    sector         = EXCLUDED.sector,
                    industry       = EXCLUDED.industry,
                    updated_at     = now()
            "#,
        )
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(stock.last_sale)
        .bind(stock.net_change)
        .bind(stock.percent_change)
        .bind(stock.market_cap)
        .bind(&stock.country)
        .bind(stock.ipo_year)
        .bind(stock.volume)
        .bind(&stock.sector)
        .bind(&stock.industry)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// UPSERT daily prices keyed by (symbol, trade_date).
pub async fn upsert_historical_prices(
    tx: &mut Transaction<'_, Postgres>,
    symbol: &str,
    prices: &[HistoricalPrice],
) -> Result<(), sqlx::Error> {
    for price in prices {
        sqlx::query(
            r#"
            INSERT INTO historical_prices (symbol, trade_date, close, volume, open, high, low)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (symbol, trade_date) DO UPDATE
                SET close      = EXCLUDED.close,
                    volume     = EXCLUDED.volume,
                    open       = EXCLUDED.open,
                    high       = EXCLUDED.high,
                    low        = EXCLUDED.low,
                    updated_at = now()
            "#,
        )
        .bind(symbol)
        .bind(price.date)
        .bind(price.close)
        .bind(price.volume)
        .bind(price.open)
        .bind(price.high)
        .bind(price.low)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
