//! Market data for the trading loop
//!
//! Pulls recent candles, reduces them to the three numbers the strategies
//! read (price, RSI, lower Bollinger band) and keeps the loop alive with
//! synthetic readings when the exchange cannot be reached.

mod synthetic;

pub use synthetic::SyntheticPrices;

use crate::client::Exchange;
use crate::config::{ExchangeConfig, IndicatorConfig};
use crate::error::{BotError, Result};
use crate::indicators;
use crate::types::{DataSource, MarketSnapshot};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, warn};

pub struct MarketFeed {
    exchange: Option<Arc<dyn Exchange>>,
    symbol: String,
    interval: String,
    candle_limit: u32,
    indicators: IndicatorConfig,
    synthetic: SyntheticPrices,
}

impl MarketFeed {
    pub fn new(
        exchange: Option<Arc<dyn Exchange>>,
        exchange_config: &ExchangeConfig,
        indicators: IndicatorConfig,
    ) -> Self {
        Self {
            exchange,
            symbol: exchange_config.symbol.clone(),
            interval: exchange_config.interval.clone(),
            candle_limit: exchange_config.candle_limit,
            indicators,
            synthetic: SyntheticPrices::new(),
        }
    }

    /// Replace the random source (tests use a seeded one)
    pub fn with_synthetic(mut self, synthetic: SyntheticPrices) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Reading for this tick.
    ///
    /// `None` when no exchange is configured at all. Fetch failures fall back
    /// to a synthetic reading around `last_price`.
    pub async fn snapshot(&self, last_price: Decimal) -> Option<MarketSnapshot> {
        let exchange = self.exchange.as_ref()?;

        match self.fetch(exchange.as_ref()).await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                error!("❌ Failed to fetch market data: {}", e);
                warn!("⚠️ Using SYNTHETIC market data (IP restriction or API failure)");
                Some(self.synthetic.generate(last_price))
            }
        }
    }

    async fn fetch(&self, exchange: &dyn Exchange) -> Result<MarketSnapshot> {
        let candles = exchange
            .fetch_candles(&self.symbol, &self.interval, self.candle_limit)
            .await?;
        let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        self.analyze(&closes)
            .ok_or_else(|| BotError::Api(format!("No candles returned for {}", self.symbol)))
    }

    /// Indicators over a close series, `None` for an empty series
    pub fn analyze(&self, closes: &[Decimal]) -> Option<MarketSnapshot> {
        let price = *closes.last()?;
        let rsi = indicators::rsi(closes, self.indicators.rsi_period);
        let bands = indicators::bollinger(closes, self.indicators.bb_period, self.indicators.bb_std_dev)?;

        Some(MarketSnapshot {
            price,
            rsi,
            bb_lower: bands.lower,
            source: DataSource::Live,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockExchange;
    use crate::types::Candle;
    use rust_decimal_macros::dec;

    fn candles(closes: &[Decimal]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                open_time: i as i64 * 300_000,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: dec!(1),
                close_time: i as i64 * 300_000 + 299_999,
            })
            .collect()
    }

    fn feed(exchange: Option<Arc<dyn Exchange>>) -> MarketFeed {
        MarketFeed::new(exchange, &ExchangeConfig::default(), IndicatorConfig::default())
            .with_synthetic(SyntheticPrices::seeded(7))
    }

    #[tokio::test]
    async fn test_snapshot_without_exchange() {
        assert!(feed(None).snapshot(dec!(0)).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_from_candles() {
        let closes: Vec<Decimal> = (1..=100).map(Decimal::from).collect();
        let mut mock = MockExchange::new();
        let rows = candles(&closes);
        mock.expect_fetch_candles()
            .times(1)
            .returning(move |symbol, interval, limit| {
                assert_eq!(symbol, "BTC/USDT");
                assert_eq!(interval, "5m");
                assert_eq!(limit, 100);
                Ok(rows.clone())
            });

        let snapshot = feed(Some(Arc::new(mock))).snapshot(dec!(0)).await.unwrap();
        assert_eq!(snapshot.price, dec!(100));
        assert_eq!(snapshot.rsi, dec!(100));
        assert_eq!(snapshot.source, DataSource::Live);
        assert!(snapshot.bb_lower < dec!(90.5));
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_synthetic() {
        let mut mock = MockExchange::new();
        mock.expect_fetch_candles()
            .returning(|_, _, _| Err(BotError::Api("Service unavailable from a restricted location".into())));

        let snapshot = feed(Some(Arc::new(mock))).snapshot(dec!(60000)).await.unwrap();
        assert_eq!(snapshot.source, DataSource::Synthetic);
        assert!(snapshot.price >= dec!(59940) && snapshot.price <= dec!(60060));
    }

    #[tokio::test]
    async fn test_empty_candles_fall_back_to_synthetic() {
        let mut mock = MockExchange::new();
        mock.expect_fetch_candles().returning(|_, _, _| Ok(Vec::new()));

        let snapshot = feed(Some(Arc::new(mock))).snapshot(dec!(0)).await.unwrap();
        assert_eq!(snapshot.source, DataSource::Synthetic);
    }

    #[test]
    fn test_analyze_short_history() {
        let snapshot = feed(None).analyze(&[dec!(10), dec!(11)]).unwrap();
        assert_eq!(snapshot.price, dec!(11));
        assert_eq!(snapshot.rsi, dec!(50));
        assert_eq!(snapshot.bb_lower, dec!(11));
    }
}
