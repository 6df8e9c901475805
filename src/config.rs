//! Configuration management
//!
//! Settings come from three layers, later ones winning:
//! an optional TOML file, `LAB__SECTION__KEY` environment variables, and the
//! well-known exchange variables (`BINANCE_API_KEY`, `BINANCE_SECRET`,
//! `SYMBOL`, `AMOUNT_INVEST`, `PROXY_URL`), which may also live in `.env`.

use crate::error::{BotError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

/// Binance connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeConfig {
    /// Set to false to run without any exchange (no market data at all)
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Trading pair, `BTC/USDT` or `BTCUSDT`
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Candle interval used for indicators
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub proxy_url: Option<String>,
    /// Order quantities are truncated to this many decimals (LOT_SIZE step)
    #[serde(default = "default_quantity_decimals")]
    pub quantity_decimals: u32,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_base_url(),
            api_key: None,
            api_secret: None,
            symbol: default_symbol(),
            interval: default_interval(),
            candle_limit: default_candle_limit(),
            recv_window_ms: default_recv_window(),
            timeout_secs: default_timeout(),
            proxy_url: None,
            quantity_decimals: default_quantity_decimals(),
        }
    }
}

impl ExchangeConfig {
    /// API key and secret, only when both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some((key, secret))
            }
            _ => None,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials().is_some()
    }

    /// API key shortened for display
    pub fn masked_key(&self) -> String {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => {
                format!("{}...", key.chars().take(8).collect::<String>())
            }
            _ => "NOT CONFIGURED".to_string(),
        }
    }
}

/// Position sizing and loop timing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TradingConfig {
    /// Quote amount spent per entry (USDT)
    #[serde(default = "default_amount_invest")]
    pub amount_invest: Decimal,
    /// Fee charged on each simulated fill (0.001 = 0.1%)
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
    /// Starting paper balance of every strategy
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            amount_invest: default_amount_invest(),
            fee_rate: default_fee_rate(),
            initial_balance: default_initial_balance(),
            poll_interval_secs: default_poll_interval(),
            error_backoff_secs: default_error_backoff(),
            state_file: default_state_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_bb_period")]
    pub bb_period: usize,
    #[serde(default = "default_bb_std_dev")]
    pub bb_std_dev: Decimal,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            bb_period: default_bb_period(),
            bb_std_dev: default_bb_std_dev(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Trade journal is skipped when disabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_db_path(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_symbol() -> String {
    "BTC/USDT".to_string()
}
fn default_interval() -> String {
    "5m".to_string()
}
fn default_candle_limit() -> u32 {
    100
}
fn default_recv_window() -> u64 {
    5000
}
fn default_timeout() -> u64 {
    30
}
fn default_quantity_decimals() -> u32 {
    5
}
fn default_amount_invest() -> Decimal {
    dec!(11)
}
fn default_fee_rate() -> Decimal {
    dec!(0.001)
}
fn default_initial_balance() -> Decimal {
    dec!(100)
}
fn default_poll_interval() -> u64 {
    5
}
fn default_error_backoff() -> u64 {
    10
}
fn default_state_file() -> String {
    "lab_data.json".to_string()
}
fn default_rsi_period() -> usize {
    14
}
fn default_bb_period() -> usize {
    20
}
fn default_bb_std_dev() -> Decimal {
    dec!(2)
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_db_path() -> String {
    "data/trading_lab.db".to_string()
}

impl Config {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::from(Path::new(path)));
        } else {
            tracing::debug!("Config file {} not found, using defaults", path);
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("LAB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = settings.try_deserialize()?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Apply the well-known exchange variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("BINANCE_API_KEY") {
            self.exchange.api_key = Some(key);
        }
        if let Some(secret) = lookup("BINANCE_SECRET") {
            self.exchange.api_secret = Some(secret);
        }
        if let Some(symbol) = lookup("SYMBOL") {
            self.exchange.symbol = symbol;
        }
        if let Some(proxy) = lookup("PROXY_URL").filter(|p| !p.is_empty()) {
            self.exchange.proxy_url = Some(proxy);
        }
        if let Some(amount) = lookup("AMOUNT_INVEST") {
            self.trading.amount_invest = amount
                .trim()
                .parse()
                .map_err(|e| BotError::Config(format!("Invalid AMOUNT_INVEST {}: {}", amount, e)))?;
        }
        Ok(())
    }

    fn expand_paths(&mut self) {
        self.trading.state_file = shellexpand::tilde(&self.trading.state_file).into_owned();
        self.database.path = shellexpand::tilde(&self.database.path).into_owned();
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.trading.amount_invest <= Decimal::ZERO {
            return Err(BotError::Config("amount_invest must be positive".into()));
        }
        if self.trading.fee_rate < Decimal::ZERO || self.trading.fee_rate >= Decimal::ONE {
            return Err(BotError::Config("fee_rate must be in [0, 1)".into()));
        }
        if self.indicators.rsi_period == 0 || self.indicators.bb_period == 0 {
            return Err(BotError::Config("indicator periods must be non-zero".into()));
        }
        if self.exchange.candle_limit == 0 {
            return Err(BotError::Config("candle_limit must be non-zero".into()));
        }
        Ok(())
    }
}
