//! Database module

pub mod queries;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create a database connection pool
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Create the import target tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    info!("Ensuring import schema...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS listed_stocks (
            symbol          TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            last_sale       DOUBLE PRECISION NOT NULL DEFAULT 0,
            net_change      DOUBLE PRECISION NOT NULL DEFAULT 0,
            percent_change  DOUBLE PRECISION NOT NULL DEFAULT 0,
            market_cap      DOUBLE PRECISION NOT NULL DEFAULT 0,
            country         TEXT,
            ipo_year        INTEGER,
            volume          BIGINT NOT NULL DEFAULT 0,
            sector          TEXT,
            industry        TEXT,
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS historical_prices (
            symbol      TEXT NOT NULL,
            trade_date  DATE NOT NULL,
            close       DOUBLE PRECISION NOT NULL DEFAULT 0,
            volume      BIGINT NOT NULL DEFAULT 0,
            open        DOUBLE PRECISION NOT NULL DEFAULT 0,
            high        DOUBLE PRECISION NOT NULL DEFAULT 0,
            low         DOUBLE PRECISION NOT NULL DEFAULT 0,
            updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (symbol, trade_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    info!("Import schema ready");
    Ok(())
}
