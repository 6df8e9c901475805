//! Technical indicators
//!
//! RSI and Bollinger bands over a window of closing prices. Both work on the
//! tail of the series, so callers can pass the whole candle history.

use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

/// RSI returned when there is not enough history
pub const NEUTRAL_RSI: Decimal = dec!(50);

/// Relative Strength Index over the last `period` price changes.
///
/// Gains and losses are averaged with a simple mean (no Wilder smoothing).
/// Returns 50 with fewer than `period` prices and 100 when there were no
/// losses in the window.
pub fn rsi(closes: &[Decimal], period: usize) -> Decimal {
    if period == 0 || closes.len() < period || closes.len() < 2 {
        return NEUTRAL_RSI;
    }

    let deltas: Vec<Decimal> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    let window = &deltas[deltas.len().saturating_sub(period)..];
    let n = Decimal::from(window.len());

    let avg_gain = window
        .iter()
        .filter(|d| **d > Decimal::ZERO)
        .sum::<Decimal>()
        / n;
    let avg_loss = window
        .iter()
        .filter(|d| **d < Decimal::ZERO)
        .map(|d| d.abs())
        .sum::<Decimal>()
        / n;

    if avg_loss.is_zero() {
        return Decimal::ONE_HUNDRED;
    }

    let rs = avg_gain / avg_loss;
    Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs)
}

/// Bollinger bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

impl Bands {
    fn flat(value: Decimal) -> Self {
        Self {
            upper: value,
            middle: value,
            lower: value,
        }
    }
}

/// Bollinger bands over the last `period` closes, `num_std` population
/// standard deviations around the simple moving average.
///
/// With fewer than `period` closes all three bands collapse to the last
/// close. `None` only for an empty series.
pub fn bollinger(closes: &[Decimal], period: usize, num_std: Decimal) -> Option<Bands> {
    let last = *closes.last()?;
    if period == 0 || closes.len() < period {
        return Some(Bands::flat(last));
    }

    let window = &closes[closes.len() - period..];
    let n = Decimal::from(period);
    let middle = window.iter().sum::<Decimal>() / n;
    let variance = window
        .iter()
        .map(|x| {
            let diff = *x - middle;
            diff * diff
        })
        .sum::<Decimal>()
        / n;
    let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);

    Some(Bands {
        upper: middle + num_std * std_dev,
        middle,
        lower: middle - num_std * std_dev,
    })
}
