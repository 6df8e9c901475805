//! Core types shared across the lab

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a trade only touched the paper book or hit the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeMode {
    Sim,
    Real,
}

/// Kind of entry in a strategy's trade list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeType {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "BUY REAL")]
    BuyReal,
    #[serde(rename = "SELL REAL")]
    SellReal,
}

impl TradeType {
    pub fn new(side: Side, mode: TradeMode) -> Self {
        match (side, mode) {
            (Side::Buy, TradeMode::Sim) => TradeType::Buy,
            (Side::Sell, TradeMode::Sim) => TradeType::Sell,
            (Side::Buy, TradeMode::Real) => TradeType::BuyReal,
            (Side::Sell, TradeMode::Real) => TradeType::SellReal,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            TradeType::Buy | TradeType::BuyReal => Side::Buy,
            TradeType::Sell | TradeType::SellReal => Side::Sell,
        }
    }
}

/// Where a market snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Live,
    /// Randomly generated because the exchange could not be reached
    Synthetic,
}

/// OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// Everything the strategies need for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price: Decimal,
    pub rsi: Decimal,
    pub bb_lower: Decimal,
    pub source: DataSource,
    pub timestamp: DateTime<Utc>,
}

/// Result of a market order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub order_id: String,
    pub filled_qty: Decimal,
    /// Average fill price, absent when the exchange did not report fills
    pub avg_price: Option<Decimal>,
    pub status: String,
    /// Quote asset spent or received, zero when not reported
    #[serde(default)]
    pub quote_qty: Decimal,
    #[serde(default)]
    pub commissions: Vec<Commission>,
}

impl OrderFill {
    /// Total commission charged in `asset`
    pub fn commission_in(&self, asset: &str) -> Decimal {
        self.commissions
            .iter()
            .filter(|c| c.asset == asset)
            .map(|c| c.amount)
            .sum()
    }

    /// Quote value of the fill, estimated from the average price when the
    /// exchange did not report it
    pub fn quote_value(&self, fallback_price: Decimal) -> Decimal {
        if self.quote_qty > Decimal::ZERO {
            self.quote_qty
        } else {
            self.filled_qty * self.avg_price.unwrap_or(fallback_price)
        }
    }
}

/// Fee charged on one fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub asset: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl AssetBalance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }
}

/// Spot account details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub uid: Option<String>,
    pub account_type: String,
    pub can_trade: bool,
    pub can_withdraw: bool,
    pub permissions: Vec<String>,
    /// Maker commission in basis points
    pub maker_commission: Decimal,
    /// Taker commission in basis points
    pub taker_commission: Decimal,
    pub balances: Vec<AssetBalance>,
}

impl AccountInfo {
    /// Total (free + locked) of one asset, zero if absent
    pub fn total(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(AssetBalance::total)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn free(&self, asset: &str) -> Decimal {
        self.balances
            .iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO)
    }

    /// Assets with a positive total, keyed by asset name
    pub fn non_zero_balances(&self) -> BTreeMap<String, Decimal> {
        self.balances
            .iter()
            .filter(|b| b.total() > Decimal::ZERO)
            .map(|b| (b.asset.clone(), b.total()))
            .collect()
    }

    /// Commission in percent (basis points / 100)
    pub fn maker_fee_pct(&self) -> Decimal {
        self.maker_commission / Decimal::ONE_HUNDRED
    }

    pub fn taker_fee_pct(&self) -> Decimal {
        self.taker_commission / Decimal::ONE_HUNDRED
    }
}

/// `BTC/USDT` → `BTCUSDT`
pub fn exchange_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Base asset of a `BASE/QUOTE` pair
pub fn base_asset(symbol: &str) -> &str {
    match symbol.split_once('/') {
        Some((base, _)) => base,
        None => symbol.strip_suffix("USDT").unwrap_or(symbol),
    }
}

/// Quote asset of a `BASE/QUOTE` pair, falling back to USDT
pub fn quote_asset(symbol: &str) -> &str {
    symbol
        .split_once('/')
        .map(|(_, quote)| quote)
        .filter(|q| !q.is_empty())
        .unwrap_or("USDT")
}
