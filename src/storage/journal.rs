//! SQLite trade journal

use crate::error::{BotError, Result};
use crate::lab::TradeRecord;
use crate::strategy::StrategyKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trades (
    id          TEXT PRIMARY KEY,
    recorded_at TEXT NOT NULL,
    strategy    TEXT NOT NULL,
    symbol      TEXT NOT NULL,
    trade_type  TEXT NOT NULL,
    mode        TEXT NOT NULL,
    price       TEXT NOT NULL,
    qty         TEXT NOT NULL,
    profit      TEXT,
    order_id    TEXT,
    reason      TEXT
)
"#;

/// Row of the journal
#[derive(Debug, Clone, Serialize)]
pub struct JournalEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub strategy: String,
    pub symbol: String,
    pub trade_type: String,
    pub mode: String,
    pub price: Decimal,
    pub qty: Decimal,
    pub profit: Option<Decimal>,
    pub order_id: Option<String>,
    pub reason: Option<String>,
}

/// Append-only log of every executed trade
#[derive(Clone)]
pub struct TradeJournal {
    pool: SqlitePool,
}

impl TradeJournal {
    /// Open (or create) the journal database at `path`
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    /// Private in-memory journal
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        // a single connection keeps the in-memory database alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn record(&self, strategy: StrategyKind, symbol: &str, trade: &TradeRecord) -> Result<()> {
        let trade_type = serde_json::to_value(trade.trade_type)?;
        let mode = serde_json::to_value(trade.mode)?;

        sqlx::query(
            "INSERT INTO trades (id, recorded_at, strategy, symbol, trade_type, mode, price, qty, profit, order_id, reason)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(trade.id.to_string())
        .bind(Utc::now())
        .bind(strategy.key())
        .bind(symbol)
        .bind(trade_type.as_str().unwrap_or_default().to_string())
        .bind(mode.as_str().unwrap_or_default().to_string())
        .bind(trade.price.to_string())
        .bind(trade.qty.to_string())
        .bind(trade.profit.map(|p| p.to_string()))
        .bind(trade.order_id.clone())
        .bind(trade.reason.clone())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Newest first
    pub async fn recent(&self, limit: u32) -> Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            "SELECT id, recorded_at, strategy, symbol, trade_type, mode, price, qty, profit, order_id, reason
             FROM trades ORDER BY recorded_at DESC, rowid DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let profit: Option<String> = row.try_get("profit")?;
                Ok(JournalEntry {
                    id: row.try_get("id")?,
                    recorded_at: row.try_get("recorded_at")?,
                    strategy: row.try_get("strategy")?,
                    symbol: row.try_get("symbol")?,
                    trade_type: row.try_get("trade_type")?,
                    mode: row.try_get("mode")?,
                    price: parse_decimal(&row.try_get::<String, _>("price")?)?,
                    qty: parse_decimal(&row.try_get::<String, _>("qty")?)?,
                    profit: profit.as_deref().map(parse_decimal).transpose()?,
                    order_id: row.try_get("order_id")?,
                    reason: row.try_get("reason")?,
                })
            })
            .collect()
    }

    /// Realised simulated profit per strategy
    pub async fn realized_by_strategy(&self) -> Result<Vec<(String, Decimal)>> {
        let rows = sqlx::query(
            "SELECT strategy, profit FROM trades WHERE mode = 'SIM' AND profit IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut totals: std::collections::BTreeMap<String, Decimal> = Default::default();
        for row in &rows {
            let strategy: String = row.try_get("strategy")?;
            let profit = parse_decimal(&row.try_get::<String, _>("profit")?)?;
            *totals.entry(strategy).or_default() += profit;
        }
        Ok(totals.into_iter().collect())
    }
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    s.parse()
        .map_err(|e| BotError::Internal(format!("Invalid decimal in journal {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lab::StrategyBook;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_record_and_read_back() {
        let journal = TradeJournal::in_memory().await.unwrap();
        let mut book = StrategyBook::new(StrategyKind::Conservative, dec!(100));
        let buy = book.simulate_buy(dec!(100), dec!(10), dec!(0)).unwrap();
        let sell = book.simulate_sell(dec!(102), dec!(10), dec!(0), None).unwrap();

        journal.record(StrategyKind::Conservative, "BTC/USDT", &buy).await.unwrap();
        journal.record(StrategyKind::Conservative, "BTC/USDT", &sell).await.unwrap();

        let entries = journal.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].trade_type, "SELL");
        assert_eq!(entries[0].profit, Some(dec!(0.2)));
        assert_eq!(entries[1].trade_type, "BUY");
        assert_eq!(entries[1].mode, "SIM");
        assert_eq!(entries[1].strategy, "conservative");
        assert!(entries[1].profit.is_none());
    }

    #[tokio::test]
    async fn test_recent_respects_limit() {
        let journal = TradeJournal::in_memory().await.unwrap();
        for _ in 0..3 {
            let mut book = StrategyBook::new(StrategyKind::RsiPure, dec!(100));
            let buy = book.simulate_buy(dec!(100), dec!(10), dec!(0)).unwrap();
            journal.record(StrategyKind::RsiPure, "BTC/USDT", &buy).await.unwrap();
        }
        assert_eq!(journal.recent(2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_realized_by_strategy() {
        let journal = TradeJournal::in_memory().await.unwrap();
        for (kind, exit) in [
            (StrategyKind::Aggressive, dec!(110)),
            (StrategyKind::Aggressive, dec!(95)),
            (StrategyKind::RsiPure, dec!(101)),
        ] {
            let mut book = StrategyBook::new(kind, dec!(100));
            book.simulate_buy(dec!(100), dec!(10), dec!(0)).unwrap();
            let sell = book.simulate_sell(exit, dec!(10), dec!(0), None).unwrap();
            journal.record(kind, "BTC/USDT", &sell).await.unwrap();
        }

        let totals = journal.realized_by_strategy().await.unwrap();
        assert_eq!(
            totals,
            vec![
                ("aggressive".to_string(), dec!(0.5)),
                ("rsi_pure".to_string(), dec!(0.1)),
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db").join("journal.db");
        let journal = TradeJournal::connect(path.to_str().unwrap()).await.unwrap();
        assert!(journal.recent(5).await.unwrap().is_empty());
        assert!(path.exists());
    }
}
