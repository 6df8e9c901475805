//! Trading strategies
//!
//! Three fixed mean-reversion rules share one exit rule. Entries look for
//! an oversold RSI, optionally confirmed by price closing under the lower
//! Bollinger band; exits take profit or stop out at ±1.5%, or leave when the
//! market turns overbought.


use crate::error::BotError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One of the lab's built-in strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Conservative,
    Aggressive,
    RsiPure,
}

/// Entry thresholds of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyRules {
    /// Enter only below this RSI
    pub max_entry_rsi: Decimal,
    /// Also require price under the lower Bollinger band
    pub requires_band_break: bool,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::Conservative,
        StrategyKind::Aggressive,
        StrategyKind::RsiPure,
    ];

    /// Key used in the state file and the HTTP API
    pub fn key(&self) -> &'static str {
        match self {
            StrategyKind::Conservative => "conservative",
            StrategyKind::Aggressive => "aggressive",
            StrategyKind::RsiPure => "rsi_pure",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::Conservative => "Conservative 🛡️",
            StrategyKind::Aggressive => "Aggressive 🚀",
            StrategyKind::RsiPure => "Pure RSI 🎯",
        }
    }

    pub fn rules(&self) -> StrategyRules {
        match self {
            StrategyKind::Conservative => StrategyRules {
                max_entry_rsi: dec!(30),
                requires_band_break: true,
            },
            StrategyKind::Aggressive => StrategyRules {
                max_entry_rsi: dec!(45),
                requires_band_break: true,
            },
            StrategyKind::RsiPure => StrategyRules {
                max_entry_rsi: dec!(30),
                requires_band_break: false,
            },
        }
    }

    /// Buy signal for a flat book
    pub fn entry_signal(&self, price: Decimal, rsi: Decimal, bb_lower: Decimal) -> bool {
        let rules = self.rules();
        rsi < rules.max_entry_rsi && (!rules.requires_band_break || price < bb_lower)
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StrategyKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.key() == s)
            .ok_or_else(|| BotError::InvalidStrategy(s.to_string()))
    }
}

/// Why an open position should be closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    TakeProfit,
    StopLoss,
    Overbought,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit => write!(f, "TAKE_PROFIT"),
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::Overbought => write!(f, "OVERBOUGHT"),
        }
    }
}

/// Exit thresholds shared by every strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitRules {
    /// Percent gain that closes the position
    pub take_profit_pct: Decimal,
    /// Percent loss that closes the position
    pub stop_loss_pct: Decimal,
    pub overbought_rsi: Decimal,
}

impl Default for ExitRules {
    fn default() -> Self {
        Self {
            take_profit_pct: dec!(1.5),
            stop_loss_pct: dec!(1.5),
            overbought_rsi: dec!(70),
        }
    }
}

impl ExitRules {
    /// Sell signal for an open position, if any
    pub fn check(&self, entry_price: Decimal, price: Decimal, rsi: Decimal) -> Option<ExitReason> {
        let profit_pct = profit_pct(entry_price, price);

        if profit_pct > self.take_profit_pct {
            Some(ExitReason::TakeProfit)
        } else if profit_pct < -self.stop_loss_pct {
            Some(ExitReason::StopLoss)
        } else if rsi > self.overbought_rsi {
            Some(ExitReason::Overbought)
        } else {
            None
        }
    }
}

/// Percent move from entry to `price`, zero for a zero entry
pub fn profit_pct(entry_price: Decimal, price: Decimal) -> Decimal {
    if entry_price.is_zero() {
        return Decimal::ZERO;
    }
    (price - entry_price) / entry_price * Decimal::ONE_HUNDRED
}
