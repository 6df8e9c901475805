//! Lab state
//!
//! Holds the three paper books, the operator's choices (selected strategy,
//! live mode) and the latest market/account readings shown on the dashboard.

mod book;


pub use book::{BookSummary, Position, StrategyBook, TradeRecord};

use crate::strategy::StrategyKind;
use crate::types::{AccountInfo, DataSource, MarketSnapshot};
use chrono::{DateTime, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// State shared between the trading loop and the dashboard
pub type SharedLab = Arc<RwLock<LabState>>;

const PLACEHOLDER: &str = "---";

/// Exchange account details shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: String,
    #[serde(rename = "type")]
    pub account_type: String,
    pub can_trade: bool,
    pub balances: BTreeMap<String, Decimal>,
}

impl Default for UserInfo {
    fn default() -> Self {
        Self {
            uid: PLACEHOLDER.to_string(),
            account_type: PLACEHOLDER.to_string(),
            can_trade: false,
            balances: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabState {
    pub strategies: BTreeMap<StrategyKind, StrategyBook>,
    pub selected_strategy: StrategyKind,
    pub is_live: bool,
    /// Holding bought with real orders, independent of the paper books
    pub live_position: Option<Position>,
    pub real_balance: Decimal,
    /// Local time of the last tick, `HH:MM:SS`
    pub last_update: String,
    pub current_price: Decimal,
    pub status: String,
    pub user_info: UserInfo,
    pub data_source: DataSource,
    #[serde(skip)]
    initial_balance: Decimal,
}

impl LabState {
    pub fn new(initial_balance: Decimal) -> Self {
        let strategies = StrategyKind::ALL
            .into_iter()
            .map(|kind| (kind, StrategyBook::new(kind, initial_balance)))
            .collect();

        Self {
            strategies,
            selected_strategy: StrategyKind::Conservative,
            is_live: false,
            live_position: None,
            real_balance: Decimal::ZERO,
            last_update: String::new(),
            current_price: Decimal::ZERO,
            status: "Running".to_string(),
            user_info: UserInfo::default(),
            data_source: DataSource::Live,
            initial_balance,
        }
    }

    pub fn shared(self) -> SharedLab {
        Arc::new(RwLock::new(self))
    }

    pub fn book(&self, kind: StrategyKind) -> &StrategyBook {
        // every kind is inserted on construction and on restore
        &self.strategies[&kind]
    }

    pub fn book_mut(&mut self, kind: StrategyKind) -> &mut StrategyBook {
        let initial = self.initial_balance;
        self.strategies
            .entry(kind)
            .or_insert_with(|| StrategyBook::new(kind, initial))
    }

    pub fn select_strategy(&mut self, kind: StrategyKind) {
        self.selected_strategy = kind;
    }

    pub fn set_live(&mut self, is_live: bool) {
        self.is_live = is_live;
    }

    /// Record the price a tick ran against
    pub fn apply_snapshot(&mut self, snapshot: &MarketSnapshot) {
        self.current_price = snapshot.price;
        self.data_source = snapshot.source;
        self.last_update = Local::now().format("%H:%M:%S").to_string();
    }

    /// Refresh account details; `quote` is the asset reported as `real_balance`
    pub fn apply_account(&mut self, account: &AccountInfo, quote: &str) {
        self.user_info.uid = account
            .uid
            .clone()
            .unwrap_or_else(|| "not provided".to_string());
        self.user_info.account_type = account.account_type.clone();
        self.user_info.can_trade = account.can_trade;
        self.user_info.balances = account.non_zero_balances();
        self.real_balance = account.total(quote);
    }

    /// Part of the state that survives restarts
    pub fn to_persisted(&self) -> PersistedLab {
        PersistedLab {
            strategies: self.strategies.clone(),
            selected_strategy: self.selected_strategy,
            is_live: self.is_live,
            live_position: self.live_position.clone(),
            last_save: Some(Local::now()),
        }
    }

    /// Replace books and operator choices with a saved copy
    pub fn restore(&mut self, saved: PersistedLab) {
        if !saved.strategies.is_empty() {
            self.strategies = saved.strategies;
        }
        for kind in StrategyKind::ALL {
            self.book_mut(kind);
        }
        self.selected_strategy = saved.selected_strategy;
        self.is_live = saved.is_live;
        self.live_position = saved.live_position;
    }

    pub fn summary(&self) -> Vec<BookSummary> {
        self.strategies
            .iter()
            .map(|(kind, book)| book.summary(*kind, self.initial_balance))
            .collect()
    }
}

/// On-disk layout of the lab file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedLab {
    #[serde(default)]
    pub strategies: BTreeMap<StrategyKind, StrategyBook>,
    #[serde(default = "default_selected")]
    pub selected_strategy: StrategyKind,
    #[serde(default)]
    pub is_live: bool,
    #[serde(default)]
    pub live_position: Option<Position>,
    #[serde(default)]
    pub last_save: Option<DateTime<Local>>,
}

fn default_selected() -> StrategyKind {
    StrategyKind::Conservative
}
