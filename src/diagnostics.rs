//! Exchange connection diagnostics
//!
//! Walks through the public endpoint, the signed balance call and the account
//! permissions, stopping at the first failure and classifying it.

use crate::client::Exchange;
use crate::config::ExchangeConfig;
use crate::error::BotError;
use crate::types::{quote_asset, AccountInfo};
use rust_decimal::Decimal;
use std::fmt::Write;
use tracing::debug;

/// Why a diagnostic run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    MissingCredentials,
    Authentication,
    Network,
    Other,
}

impl FailureKind {
    pub fn classify(err: &BotError) -> Self {
        if err.is_auth() {
            FailureKind::Authentication
        } else if err.is_network() {
            FailureKind::Network
        } else {
            FailureKind::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::MissingCredentials => "MISSING API KEYS",
            FailureKind::Authentication => "AUTHENTICATION ERROR",
            FailureKind::Network => "NETWORK ERROR",
            FailureKind::Other => "UNKNOWN ERROR",
        }
    }

    pub fn hints(&self) -> &'static [&'static str] {
        match self {
            FailureKind::MissingCredentials => {
                &["Set BINANCE_API_KEY and BINANCE_SECRET in .env or the config file"]
            }
            FailureKind::Authentication => &[
                "Check that the API key and secret are correct",
                "Check that this machine's IP is allowed for the key",
            ],
            FailureKind::Network => &[
                "Check the internet connection or the configured proxy",
                "Binance blocks some regions; try a proxy from an allowed location",
            ],
            FailureKind::Other => &[
                "Wrong API keys",
                "No internet connection",
                "System clock out of sync (check recvWindow)",
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Failure {
    pub step: u8,
    pub kind: FailureKind,
    pub message: String,
}

/// Balance and permission details from a successful run
#[derive(Debug, Clone)]
pub struct AccountReport {
    pub quote_asset: String,
    pub quote_total: Decimal,
    pub quote_free: Decimal,
    pub account_type: String,
    pub permissions: Vec<String>,
    pub can_trade: bool,
    pub can_withdraw: bool,
    pub maker_fee_pct: Decimal,
    pub taker_fee_pct: Decimal,
}

impl AccountReport {
    fn new(account: &AccountInfo, quote: &str) -> Self {
        Self {
            quote_asset: quote.to_string(),
            quote_total: account.total(quote),
            quote_free: account.free(quote),
            account_type: account.account_type.clone(),
            permissions: account.permissions.clone(),
            can_trade: account.can_trade,
            can_withdraw: account.can_withdraw,
            maker_fee_pct: account.maker_fee_pct(),
            taker_fee_pct: account.taker_fee_pct(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiagnosticReport {
    pub masked_key: String,
    pub secret_present: bool,
    pub server_time: Option<i64>,
    pub account: Option<AccountReport>,
    pub failure: Option<Failure>,
}

impl DiagnosticReport {
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }

    /// Human readable report for the terminal
    pub fn render(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(50);

        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "🚀 BINANCE CONNECTION TEST");
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "API key: {}", self.masked_key);
        let _ = writeln!(
            out,
            "Secret:  {}",
            if self.secret_present { "present" } else { "missing" }
        );

        if let Some(time) = self.server_time {
            let _ = writeln!(out, "\n1. Public connection (server time)");
            let _ = writeln!(out, "   ✅ OK, timestamp {}", time);
        }

        if let Some(account) = &self.account {
            let _ = writeln!(out, "\n2. Authentication (balance)");
            let _ = writeln!(
                out,
                "   💰 {} total: {:.2}",
                account.quote_asset, account.quote_total
            );
            let _ = writeln!(
                out,
                "   🔓 {} free:  {:.2}",
                account.quote_asset, account.quote_free
            );
            let _ = writeln!(out, "\n3. Account permissions");
            let _ = writeln!(out, "   👤 Account type: {}", account.account_type);
            let _ = writeln!(out, "   🔑 Permissions:  {}", account.permissions.join(", "));
            let _ = writeln!(out, "   🚦 Can trade:    {}", yes_no(account.can_trade));
            let _ = writeln!(out, "   🏧 Can withdraw: {}", yes_no(account.can_withdraw));
            let _ = writeln!(
                out,
                "   💸 Fees (maker/taker): {}% / {}%",
                account.maker_fee_pct.normalize(),
                account.taker_fee_pct.normalize()
            );
        }

        match &self.failure {
            None => {
                let _ = writeln!(out, "\n✅ Connection established, API keys are working");
            }
            Some(failure) => {
                let _ = writeln!(
                    out,
                    "\n❌ {} (step {}): {}",
                    failure.kind.label(),
                    failure.step,
                    failure.message
                );
                let _ = writeln!(out, "Possible causes:");
                for hint in failure.kind.hints() {
                    let _ = writeln!(out, "  - {}", hint);
                }
            }
        }
        let _ = writeln!(out, "{}", rule);
        out
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "✅ yes"
    } else {
        "❌ no"
    }
}

/// Run the connection checks against `exchange`
pub async fn run_diagnostics(exchange: &dyn Exchange, config: &ExchangeConfig) -> DiagnosticReport {
    let mut report = DiagnosticReport {
        masked_key: config.masked_key(),
        secret_present: config
            .api_secret
            .as_deref()
            .is_some_and(|s| !s.is_empty()),
        server_time: None,
        account: None,
        failure: None,
    };

    match exchange.server_time().await {
        Ok(time) => report.server_time = Some(time),
        Err(e) => {
            report.failure = Some(failure(1, &e));
            return report;
        }
    }

    if !exchange.has_credentials() {
        report.failure = Some(Failure {
            step: 2,
            kind: FailureKind::MissingCredentials,
            message: "API key or secret not configured".to_string(),
        });
        return report;
    }

    match exchange.account().await {
        Ok(account) => {
            report.account = Some(AccountReport::new(&account, quote_asset(&config.symbol)));
        }
        Err(e) => report.failure = Some(failure(2, &e)),
    }

    report
}

fn failure(step: u8, err: &BotError) -> Failure {
    debug!("Diagnostic step {} failed: {:?}", step, err);
    Failure {
        step,
        kind: FailureKind::classify(err),
        message: err.to_string(),
    }
}
