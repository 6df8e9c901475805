//! Live order execution
//!
//! Real orders follow the selected strategy's signals but are tracked in
//! [`LabState::live_position`], separate from the paper books. Order failures
//! are logged and leave the state untouched.
//!
//! The live position holds the quantity actually received, net of any
//! commission taken in the base asset, so the closing sell never asks for more
//! than the account holds. Realised profit is measured on quote amounts with
//! quote-asset commissions deducted, the same basis the paper books use.


use crate::client::Exchange;
use crate::lab::{LabState, Position, TradeRecord};
use crate::strategy::{profit_pct, ExitReason, ExitRules, StrategyKind};
use crate::types::{base_asset, quote_asset, MarketSnapshot, Side};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the live side wants to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveIntent {
    Buy,
    Sell { reason: ExitReason },
}

/// Filled real order, ready to be applied to the lab
#[derive(Debug, Clone, PartialEq)]
pub enum LiveOutcome {
    Opened { position: Position, trade: TradeRecord },
    Closed { trade: TradeRecord },
}

impl LiveOutcome {
    pub fn trade(&self) -> &TradeRecord {
        match self {
            LiveOutcome::Opened { trade, .. } | LiveOutcome::Closed { trade } => trade,
        }
    }

    /// Update the live position and append the trade to `kind`'s list
    pub fn apply(self, lab: &mut LabState, kind: StrategyKind) -> TradeRecord {
        let trade = match self {
            LiveOutcome::Opened { position, trade } => {
                lab.live_position = Some(position);
                trade
            }
            LiveOutcome::Closed { trade } => {
                lab.live_position = None;
                trade
            }
        };
        lab.book_mut(kind).record_real(trade.clone());
        trade
    }
}

/// Decide the live action for `kind` given the real holding
pub fn plan(
    kind: StrategyKind,
    live_position: Option<&Position>,
    snapshot: &MarketSnapshot,
    exit_rules: &ExitRules,
) -> Option<LiveIntent> {
    match live_position {
        None => kind
            .entry_signal(snapshot.price, snapshot.rsi, snapshot.bb_lower)
            .then_some(LiveIntent::Buy),
        Some(position) => exit_rules
            .check(position.entry_price, snapshot.price, snapshot.rsi)
            .map(|reason| LiveIntent::Sell { reason }),
    }
}

/// Places market orders for the selected strategy
pub struct LiveExecutor {
    exchange: Arc<dyn Exchange>,
    symbol: String,
    amount: Decimal,
}

impl LiveExecutor {
    pub fn new(exchange: Arc<dyn Exchange>, symbol: impl Into<String>, amount: Decimal) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            amount,
        }
    }

    /// Execute `intent` at the snapshot price. `None` when nothing was filled.
    pub async fn execute(
        &self,
        intent: LiveIntent,
        live_position: Option<&Position>,
        price: Decimal,
    ) -> Option<LiveOutcome> {
        if !self.exchange.has_credentials() {
            warn!("⚠️ Live mode disabled: missing API keys");
            return None;
        }

        match intent {
            LiveIntent::Buy => self.buy(price).await,
            LiveIntent::Sell { reason } => {
                let position = live_position?;
                self.sell(position, price, reason).await
            }
        }
    }

    async fn buy(&self, price: Decimal) -> Option<LiveOutcome> {
        if price <= Decimal::ZERO {
            return None;
        }
        let qty = self.amount / price;

        info!("🔴 REAL BUY {} {} @ ~{}", qty.round_dp(8), self.symbol, price);
        let fill = match self.exchange.market_buy(&self.symbol, qty).await {
            Ok(fill) => fill,
            Err(e) => {
                error!("❌ Live order failed (buy): {}", e);
                return None;
            }
        };

        let trade = TradeRecord::from_fill(Side::Buy, &fill, price);
        let held = if trade.qty > Decimal::ZERO {
            trade.qty - fill.commission_in(base_asset(&self.symbol))
        } else {
            qty
        };
        let cost = fill.quote_value(trade.price) + fill.commission_in(quote_asset(&self.symbol));
        info!(
            "✅ Order {} filled: {} @ {} (holding {}, cost {})",
            fill.order_id, trade.qty, trade.price, held, cost
        );

        let position = Position {
            entry_price: trade.price,
            qty: held,
            entry_time: Utc::now(),
            cost,
        };
        Some(LiveOutcome::Opened { position, trade })
    }

    async fn sell(&self, position: &Position, price: Decimal, reason: ExitReason) -> Option<LiveOutcome> {
        info!(
            "🔴 REAL SELL {} {} @ ~{} ({})",
            position.qty, self.symbol, price, reason
        );
        let fill = match self.exchange.market_sell(&self.symbol, position.qty).await {
            Ok(fill) => fill,
            Err(e) => {
                error!("❌ Live order failed (sell): {}", e);
                return None;
            }
        };

        let mut trade = TradeRecord::from_fill(Side::Sell, &fill, price);
        let proceeds = fill.quote_value(trade.price) - fill.commission_in(quote_asset(&self.symbol));
        let cost = position.cost_basis();
        let profit = proceeds - cost;
        trade.profit = Some(profit);
        trade.profit_pct = Some(if cost > Decimal::ZERO {
            profit / cost * Decimal::ONE_HUNDRED
        } else {
            profit_pct(position.entry_price, trade.price)
        });
        trade.reason = Some(reason.to_string());
        info!(
            "✅ Order {} filled: {} @ {} ({:+.2}%)",
            fill.order_id,
            trade.qty,
            trade.price,
            trade.profit_pct.unwrap_or_default()
        );

        Some(LiveOutcome::Closed { trade })
    }
}
