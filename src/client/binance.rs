//! Binance spot REST client
//!
//! Covers the few endpoints the lab needs: klines, server time, account,
//! market orders and order/trade history.

use crate::client::auth::{Credentials, API_KEY_HEADER};
use crate::client::Exchange;
use crate::config::ExchangeConfig;
use crate::error::{BotError, Result};
use crate::types::{exchange_symbol, AccountInfo, AssetBalance, Candle, Commission, OrderFill, Side};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Binance error codes that mean the key is wrong, revoked or IP-restricted
const AUTH_ERROR_CODES: [i64; 3] = [-1022, -2014, -2015];

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    #[serde(default)]
    uid: Option<serde_json::Value>,
    #[serde(default)]
    account_type: Option<String>,
    #[serde(default)]
    can_trade: bool,
    #[serde(default)]
    can_withdraw: bool,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    maker_commission: Decimal,
    #[serde(default)]
    taker_commission: Decimal,
    #[serde(default)]
    balances: Vec<BalanceResponse>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    asset: String,
    free: Decimal,
    locked: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    #[serde(default)]
    status: String,
    #[serde(default)]
    executed_qty: Decimal,
    #[serde(default)]
    cummulative_quote_qty: Decimal,
    #[serde(default)]
    fills: Vec<FillResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FillResponse {
    #[serde(default)]
    commission: Decimal,
    #[serde(default)]
    commission_asset: String,
}

impl From<AccountResponse> for AccountInfo {
    fn from(resp: AccountResponse) -> Self {
        let uid = resp.uid.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });
        AccountInfo {
            uid,
            account_type: resp.account_type.unwrap_or_else(|| "SPOT".to_string()),
            can_trade: resp.can_trade,
            can_withdraw: resp.can_withdraw,
            permissions: resp.permissions,
            maker_commission: resp.maker_commission,
            taker_commission: resp.taker_commission,
            balances: resp
                .balances
                .into_iter()
                .map(|b| AssetBalance {
                    asset: b.asset,
                    free: b.free,
                    locked: b.locked,
                })
                .collect(),
        }
    }
}

impl From<OrderResponse> for OrderFill {
    fn from(resp: OrderResponse) -> Self {
        let avg_price = if resp.executed_qty > Decimal::ZERO {
            Some(resp.cummulative_quote_qty / resp.executed_qty)
        } else {
            None
        };
        OrderFill {
            order_id: resp.order_id.to_string(),
            filled_qty: resp.executed_qty,
            avg_price,
            status: resp.status,
            quote_qty: resp.cummulative_quote_qty,
            commissions: resp
                .fills
                .into_iter()
                .filter(|f| f.commission > Decimal::ZERO)
                .map(|f| Commission {
                    asset: f.commission_asset,
                    amount: f.commission,
                })
                .collect(),
        }
    }
}

/// Binance REST client
#[derive(Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    recv_window_ms: u64,
    quantity_decimals: u32,
}

impl BinanceClient {
    /// Create a client from exchange settings
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if let Some(proxy_url) = &config.proxy_url {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
            tracing::info!("🌍 Using proxy: {}", proxy_url);
        }

        let credentials = config
            .credentials()
            .map(|(key, secret)| Credentials::new(key, secret));

        Ok(Self {
            http: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            recv_window_ms: config.recv_window_ms,
            quantity_decimals: config.quantity_decimals,
        })
    }

    /// Quantity truncated to the configured lot precision
    pub fn format_quantity(&self, qty: Decimal) -> String {
        qty.round_dp_with_strategy(self.quantity_decimals, RoundingStrategy::ToZero)
            .normalize()
            .to_string()
    }

    async fn public_get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.http.get(&url).query(params).send().await?;
        Self::decode(resp).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| BotError::Auth("API keys not configured".into()))?;

        let timestamp = chrono::Utc::now().timestamp_millis();
        let query = creds.signed_query(params, timestamp, self.recv_window_ms);
        let url = format!("{}{}?{}", self.base_url, path, query);

        let resp = self
            .http
            .request(method, &url)
            .header(API_KEY_HEADER, &creds.api_key)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        serde_json::from_str(&body).map_err(BotError::from)
    }

    fn classify_error(status: StatusCode, body: &str) -> BotError {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) if AUTH_ERROR_CODES.contains(&err.code) => {
                BotError::Auth(format!("{} (code {})", err.msg, err.code))
            }
            Ok(_) | Err(_)
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                BotError::Auth(format!("HTTP {}: {}", status, body))
            }
            Ok(err) => BotError::Api(format!("{} (code {})", err.msg, err.code)),
            Err(_) => BotError::Api(format!("HTTP {}: {}", status, body)),
        }
    }

    async fn market_order(&self, symbol: &str, side: Side, qty: Decimal) -> Result<OrderFill> {
        let params = [
            ("symbol", exchange_symbol(symbol)),
            ("side", side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", self.format_quantity(qty)),
            ("newOrderRespType", "FULL".to_string()),
        ];
        let resp: OrderResponse = self.signed(Method::POST, "/api/v3/order", &params).await?;
        Ok(resp.into())
    }
}

/// Parse one kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`
fn parse_kline(row: &serde_json::Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .filter(|a| a.len() >= 7)
        .ok_or_else(|| BotError::Api(format!("Malformed kline: {}", row)))?;

    let int = |i: usize| {
        fields[i]
            .as_i64()
            .ok_or_else(|| BotError::Api(format!("Malformed kline field {}: {}", i, fields[i])))
    };
    let dec = |i: usize| -> Result<Decimal> {
        fields[i]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| BotError::Api(format!("Malformed kline field {}: {}", i, fields[i])))
    };

    Ok(Candle {
        open_time: int(0)?,
        open: dec(1)?,
        high: dec(2)?,
        low: dec(3)?,
        close: dec(4)?,
        volume: dec(5)?,
        close_time: int(6)?,
    })
}

#[async_trait]
impl Exchange for BinanceClient {
    fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn fetch_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let params = [
            ("symbol", exchange_symbol(symbol)),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        let rows: Vec<serde_json::Value> = self.public_get("/api/v3/klines", &params).await?;
        rows.iter().map(parse_kline).collect()
    }

    async fn server_time(&self) -> Result<i64> {
        let resp: ServerTime = self.public_get("/api/v3/time", &[]).await?;
        Ok(resp.server_time)
    }

    async fn account(&self) -> Result<AccountInfo> {
        let resp: AccountResponse = self.signed(Method::GET, "/api/v3/account", &[]).await?;
        Ok(resp.into())
    }

    async fn market_buy(&self, symbol: &str, qty: Decimal) -> Result<OrderFill> {
        self.market_order(symbol, Side::Buy, qty).await
    }

    async fn market_sell(&self, symbol: &str, qty: Decimal) -> Result<OrderFill> {
        self.market_order(symbol, Side::Sell, qty).await
    }

    async fn my_trades(&self, symbol: &str) -> Result<serde_json::Value> {
        let params = [("symbol", exchange_symbol(symbol))];
        self.signed(Method::GET, "/api/v3/myTrades", &params).await
    }

    async fn open_orders(&self, symbol: &str) -> Result<serde_json::Value> {
        let params = [("symbol", exchange_symbol(symbol))];
        self.signed(Method::GET, "/api/v3/openOrders", &params).await
    }

    async fn all_orders(&self, symbol: &str) -> Result<serde_json::Value> {
        let params = [("symbol", exchange_symbol(symbol))];
        self.signed(Method::GET, "/api/v3/allOrders", &params).await
    }
}
