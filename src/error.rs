//! Error types

use thiserror::Error;

/// Errors raised by the trading lab
#[derive(Debug, Error)]
pub enum BotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Exchange API error: {0}")]
    Api(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid strategy: {0}")]
    InvalidStrategy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BotError {
    /// Whether the failure is a credentials/permission problem rather than connectivity
    pub fn is_auth(&self) -> bool {
        matches!(self, BotError::Auth(_))
    }

    /// Whether the failure happened before the exchange could answer
    pub fn is_network(&self) -> bool {
        match self {
            BotError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        BotError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
