//! Request signing for Binance signed endpoints
//!
//! Signed requests carry `timestamp` and `recvWindow` in the query string and
//! an HMAC-SHA256 of the full query (hex encoded) as `signature`. The API key
//! travels in the `X-MBX-APIKEY` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// API key pair
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// Hex HMAC-SHA256 of `payload` keyed with the secret
    pub fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build the signed query string for `params`
    pub fn signed_query(&self, params: &[(&str, String)], timestamp_ms: i64, recv_window_ms: u64) -> String {
        let mut query = encode_query(params);
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!("recvWindow={}&timestamp={}", recv_window_ms, timestamp_ms));
        let signature = self.sign(&query);
        format!("{}&signature={}", query, signature)
    }
}

/// `k1=v1&k2=v2`; Binance parameter values never need escaping
pub fn encode_query(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
