//! Per-strategy paper book

use crate::strategy::{ExitReason, StrategyKind};
use crate::types::{OrderFill, Side, TradeMode, TradeType};
use chrono::{DateTime, Local, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Open position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entry_price: Decimal,
    pub qty: Decimal,
    pub entry_time: DateTime<Utc>,
    /// Quote asset spent to open, fees included. Zero in files that predate it.
    #[serde(default)]
    pub cost: Decimal,
}

impl Position {
    /// Entry cost, estimated from price and quantity when not recorded
    pub fn cost_basis(&self) -> Decimal {
        if self.cost > Decimal::ZERO {
            self.cost
        } else {
            self.entry_price * self.qty
        }
    }
}

/// One line of a strategy's trade list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Local wall-clock time, `HH:MM:SS`
    pub time: String,
    #[serde(rename = "type")]
    pub trade_type: TradeType,
    pub price: Decimal,
    pub qty: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit_pct: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub mode: TradeMode,
}

impl TradeRecord {
    fn new(trade_type: TradeType, price: Decimal, qty: Decimal, mode: TradeMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            time: Local::now().format("%H:%M:%S").to_string(),
            trade_type,
            price,
            qty,
            profit: None,
            profit_pct: None,
            order_id: None,
            reason: None,
            mode,
        }
    }

    pub fn side(&self) -> Side {
        self.trade_type.side()
    }

    /// Record of a filled exchange order
    pub fn from_fill(side: Side, fill: &OrderFill, fallback_price: Decimal) -> Self {
        let mut record = Self::new(
            TradeType::new(side, TradeMode::Real),
            fill.avg_price.unwrap_or(fallback_price),
            fill.filled_qty,
            TradeMode::Real,
        );
        record.order_id = Some(fill.order_id.clone());
        record
    }
}

/// Simulated balance, trade list and open position of one strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyBook {
    pub name: String,
    pub balance: Decimal,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
    #[serde(default)]
    pub position: Option<Position>,
}

impl StrategyBook {
    pub fn new(kind: StrategyKind, initial_balance: Decimal) -> Self {
        Self {
            name: kind.display_name().to_string(),
            balance: initial_balance,
            trades: Vec::new(),
            position: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Paper buy of `amount` quote at `price`, fee taken from the quantity.
    ///
    /// No-op while a position is open.
    pub fn simulate_buy(
        &mut self,
        price: Decimal,
        amount: Decimal,
        fee_rate: Decimal,
    ) -> Option<TradeRecord> {
        if !self.is_flat() || price <= Decimal::ZERO {
            return None;
        }

        let qty = amount / price * (Decimal::ONE - fee_rate);
        self.position = Some(Position {
            entry_price: price,
            qty,
            entry_time: Utc::now(),
            cost: amount,
        });
        self.balance -= amount;

        let trade = TradeRecord::new(TradeType::Buy, price, qty, TradeMode::Sim);
        self.trades.push(trade.clone());
        Some(trade)
    }

    /// Paper sell of the whole position at `price`, fee taken from proceeds.
    ///
    /// Profit is measured against the `amount` spent on entry. No-op when flat.
    pub fn simulate_sell(
        &mut self,
        price: Decimal,
        amount: Decimal,
        fee_rate: Decimal,
        reason: Option<ExitReason>,
    ) -> Option<TradeRecord> {
        let position = self.position.take()?;

        let sell_value = position.qty * price * (Decimal::ONE - fee_rate);
        self.balance += sell_value;

        let profit = sell_value - amount;
        let pct = if amount.is_zero() {
            Decimal::ZERO
        } else {
            profit / amount * Decimal::ONE_HUNDRED
        };

        let mut trade = TradeRecord::new(TradeType::Sell, price, position.qty, TradeMode::Sim);
        trade.profit = Some(profit);
        trade.profit_pct = Some(pct);
        trade.reason = reason.map(|r| r.to_string());
        self.trades.push(trade.clone());
        Some(trade)
    }

    /// Append a real order to the trade list without touching the paper book
    pub fn record_real(&mut self, trade: TradeRecord) {
        self.trades.push(trade);
    }

    pub fn summary(&self, kind: StrategyKind, initial_balance: Decimal) -> BookSummary {
        let closed: Vec<&TradeRecord> = self
            .trades
            .iter()
            .filter(|t| t.mode == TradeMode::Sim && t.side() == Side::Sell)
            .collect();
        let realized_pnl: Decimal = closed.iter().filter_map(|t| t.profit).sum();
        let wins = closed
            .iter()
            .filter(|t| t.profit.is_some_and(|p| p > Decimal::ZERO))
            .count();
        let win_rate = if closed.is_empty() {
            Decimal::ZERO
        } else {
            Decimal::from(wins) / Decimal::from(closed.len()) * Decimal::ONE_HUNDRED
        };

        BookSummary {
            kind,
            name: self.name.clone(),
            balance: self.balance,
            return_pct: if initial_balance.is_zero() {
                Decimal::ZERO
            } else {
                realized_pnl / initial_balance * Decimal::ONE_HUNDRED
            },
            realized_pnl,
            closed_trades: closed.len(),
            winning_trades: wins,
            win_rate,
            open_position: self.position.clone(),
        }
    }
}

/// Performance of one book
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub kind: StrategyKind,
    pub name: String,
    pub balance: Decimal,
    pub realized_pnl: Decimal,
    pub return_pct: Decimal,
    pub closed_trades: usize,
    pub winning_trades: usize,
    /// 0-100
    pub win_rate: Decimal,
    pub open_position: Option<Position>,
}
