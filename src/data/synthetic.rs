//! Random-walk readings used when real market data is unavailable

use crate::types::{DataSource, MarketSnapshot};
use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Price used when there is no previous reading
pub const BASE_PRICE: Decimal = dec!(65000);

pub struct SyntheticPrices {
    rng: Mutex<StdRng>,
}

impl Default for SyntheticPrices {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticPrices {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Move `last_price` by up to ±0.1%, draw RSI from [20, 80) and put the
    /// lower band 1% under the price.
    pub fn generate(&self, last_price: Decimal) -> MarketSnapshot {
        let base = if last_price > Decimal::ZERO {
            last_price
        } else {
            BASE_PRICE
        };

        let (variation, rsi) = {
            let mut rng = self.rng.lock();
            (rng.random_range(-0.001..0.001), rng.random_range(20.0..80.0))
        };

        let variation = Decimal::from_f64_retain(variation).unwrap_or_default();
        let price = base * (Decimal::ONE + variation);
        let rsi = Decimal::from_f64_retain(rsi)
            .unwrap_or(dec!(50))
            .round_dp(2);

        MarketSnapshot {
            price,
            rsi,
            bb_lower: price * dec!(0.99),
            source: DataSource::Synthetic,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_from_base_price() {
        let synthetic = SyntheticPrices::seeded(1);
        let snapshot = synthetic.generate(Decimal::ZERO);
        assert!(snapshot.price >= dec!(64935) && snapshot.price <= dec!(65065));
        assert_eq!(snapshot.source, DataSource::Synthetic);
    }

    #[test]
    fn test_bounds_hold_over_many_draws() {
        let synthetic = SyntheticPrices::seeded(42);
        for _ in 0..500 {
            let snapshot = synthetic.generate(dec!(1000));
            assert!(snapshot.price >= dec!(999) && snapshot.price <= dec!(1001));
            assert!(snapshot.rsi >= dec!(20) && snapshot.rsi <= dec!(80));
            assert_eq!(snapshot.bb_lower, snapshot.price * dec!(0.99));
        }
    }

    #[test]
    fn test_low_priced_symbol_keeps_moving() {
        let synthetic = SyntheticPrices::seeded(7);
        let mut price = dec!(0.15);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            price = synthetic.generate(price).price;
            assert!(price > Decimal::ZERO);
            seen.insert(price);
        }
        assert!(seen.len() > 1);

        let tiny = synthetic.generate(dec!(0.00002));
        assert!(tiny.price > Decimal::ZERO);
        assert!(tiny.bb_lower > Decimal::ZERO);
        assert!(tiny.bb_lower < tiny.price);
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = SyntheticPrices::seeded(9).generate(dec!(500));
        let b = SyntheticPrices::seeded(9).generate(dec!(500));
        assert_eq!(a.price, b.price);
        assert_eq!(a.rsi, b.rsi);
    }
}
