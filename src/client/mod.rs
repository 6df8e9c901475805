//! Exchange clients
//!
//! The engine, executor and dashboard only talk to the [`Exchange`] trait;
//! [`BinanceClient`] is the production implementation.

pub mod auth;
pub mod binance;

pub use auth::Credentials;
pub use binance::BinanceClient;

use crate::error::Result;
use crate::types::{AccountInfo, Candle, OrderFill};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Spot exchange operations used by the lab
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Whether signed endpoints can be called
    fn has_credentials(&self) -> bool;

    /// Most recent `limit` candles, oldest first
    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>>;

    /// Exchange clock in milliseconds
    async fn server_time(&self) -> Result<i64>;

    async fn account(&self) -> Result<AccountInfo>;

    /// Market buy of `qty` base asset
    async fn market_buy(&self, symbol: &str, qty: Decimal) -> Result<OrderFill>;

    /// Market sell of `qty` base asset
    async fn market_sell(&self, symbol: &str, qty: Decimal) -> Result<OrderFill>;

    async fn my_trades(&self, symbol: &str) -> Result<serde_json::Value>;

    async fn open_orders(&self, symbol: &str) -> Result<serde_json::Value>;

    async fn all_orders(&self, symbol: &str) -> Result<serde_json::Value>;
}
