//! Hybrid Crypto Trading Lab
//!
//! Paper-trades three RSI/Bollinger strategies side by side on Binance spot
//! candles and, on request, mirrors the selected one with real market orders.
//!
//! ## Architecture
//!
//! ```text
//! Binance REST → MarketFeed (synthetic fallback) → TradingEngine → Lab books
//!                                                       ↓           ↑
//!                                              LiveExecutor    Dashboard (axum)
//!                                                       ↓
//!                                         LabStore (JSON) + TradeJournal (SQLite)
//! ```

pub mod client;
pub mod config;
pub mod data;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod executor;
pub mod indicators;
pub mod lab;
pub mod monitor;
pub mod storage;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod error_tests;
