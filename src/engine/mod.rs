//! Trading loop
//!
//! Each tick fetches one market snapshot, runs every paper book against it,
//! optionally mirrors the selected strategy with real orders, refreshes the
//! account and persists the lab. The shared state lock is never held while
//! waiting on the exchange.


use crate::client::Exchange;
use crate::config::{Config, TradingConfig};
use crate::data::{MarketFeed, SyntheticPrices};
use crate::error::Result;
use crate::executor::{self, LiveExecutor};
use crate::lab::{LabState, SharedLab, TradeRecord};
use crate::storage::{LabStore, TradeJournal};
use crate::strategy::{ExitRules, StrategyKind};
use crate::types::{quote_asset, DataSource, MarketSnapshot};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Result of one loop iteration
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No exchange to read from
    NoData,
    Ticked {
        price: Decimal,
        source: DataSource,
        /// Paper and real trades executed this tick
        trades: usize,
    },
}

pub struct TradingEngine {
    lab: SharedLab,
    feed: MarketFeed,
    exchange: Option<Arc<dyn Exchange>>,
    executor: Option<LiveExecutor>,
    store: LabStore,
    journal: Option<TradeJournal>,
    trading: TradingConfig,
    symbol: String,
    exit_rules: ExitRules,
}

impl TradingEngine {
    pub fn new(
        config: &Config,
        lab: SharedLab,
        exchange: Option<Arc<dyn Exchange>>,
        store: LabStore,
    ) -> Self {
        let feed = MarketFeed::new(exchange.clone(), &config.exchange, config.indicators.clone());
        let executor = exchange.clone().map(|exchange| {
            LiveExecutor::new(
                exchange,
                config.exchange.symbol.clone(),
                config.trading.amount_invest,
            )
        });

        Self {
            lab,
            feed,
            exchange,
            executor,
            store,
            journal: None,
            trading: config.trading.clone(),
            symbol: config.exchange.symbol.clone(),
            exit_rules: ExitRules::default(),
        }
    }

    pub fn with_journal(mut self, journal: TradeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_synthetic(mut self, synthetic: SyntheticPrices) -> Self {
        self.feed = self.feed.with_synthetic(synthetic);
        self
    }

    pub fn lab(&self) -> SharedLab {
        self.lab.clone()
    }

    /// Restore the lab from disk, or write a fresh file if there is none
    pub async fn load_state(&self) -> Result<()> {
        match self.store.load().await {
            Ok(Some(saved)) => {
                self.lab.write().await.restore(saved);
                info!("📂 Loaded lab state from {}", self.store.path().display());
            }
            Ok(None) => {
                info!("📝 Creating new lab data file {}", self.store.path().display());
                self.save_state().await?;
            }
            Err(e) => {
                warn!(
                    "⚠️ Could not read {} ({}), starting with fresh books",
                    self.store.path().display(),
                    e
                );
            }
        }
        Ok(())
    }

    pub async fn save_state(&self) -> Result<()> {
        let persisted = self.lab.read().await.to_persisted();
        self.store.save(&persisted).await
    }

    /// One fetch → evaluate → persist iteration
    pub async fn tick(&self) -> Result<TickOutcome> {
        let last_price = self.lab.read().await.current_price;
        let Some(snapshot) = self.feed.snapshot(last_price).await else {
            return Ok(TickOutcome::NoData);
        };

        info!(
            "📊 {} {} | RSI {} | BB lower {}{}",
            self.symbol,
            snapshot.price,
            snapshot.rsi.round_dp(2),
            snapshot.bb_lower.round_dp(2),
            if snapshot.source == DataSource::Synthetic {
                " [synthetic]"
            } else {
                ""
            }
        );

        let (mut executed, live_plan) = {
            let mut lab = self.lab.write().await;
            lab.apply_snapshot(&snapshot);
            let executed = self.simulate(&mut lab, &snapshot);

            let live_plan = if lab.is_live {
                let kind = lab.selected_strategy;
                executor::plan(kind, lab.live_position.as_ref(), &snapshot, &self.exit_rules)
                    .map(|intent| (kind, intent, lab.live_position.clone()))
            } else {
                None
            };
            (executed, live_plan)
        };

        if let (Some((kind, intent, position)), Some(live)) = (live_plan, &self.executor) {
            if let Some(outcome) = live.execute(intent, position.as_ref(), snapshot.price).await {
                let trade = outcome.apply(&mut *self.lab.write().await, kind);
                executed.push((kind, trade));
            }
        }

        self.refresh_account().await;

        // journal first so a failed save does not lose executed trades
        self.journal_trades(&executed).await;
        self.save_state().await?;

        Ok(TickOutcome::Ticked {
            price: snapshot.price,
            source: snapshot.source,
            trades: executed.len(),
        })
    }

    /// Run every paper book against the snapshot
    fn simulate(&self, lab: &mut LabState, snapshot: &MarketSnapshot) -> Vec<(StrategyKind, TradeRecord)> {
        let amount = self.trading.amount_invest;
        let fee = self.trading.fee_rate;
        let mut executed = Vec::new();

        for kind in StrategyKind::ALL {
            let book = lab.book_mut(kind);
            let exit = book
                .position
                .as_ref()
                .and_then(|p| self.exit_rules.check(p.entry_price, snapshot.price, snapshot.rsi));

            let trade = if book.is_flat() {
                if kind.entry_signal(snapshot.price, snapshot.rsi, snapshot.bb_lower) {
                    book.simulate_buy(snapshot.price, amount, fee)
                } else {
                    None
                }
            } else if let Some(reason) = exit {
                book.simulate_sell(snapshot.price, amount, fee, Some(reason))
            } else {
                None
            };

            if let Some(trade) = trade {
                match trade.profit {
                    None => info!("🟢 [{}] SIM BUY {} @ {}", book.name, trade.qty.round_dp(8), trade.price),
                    Some(profit) => info!(
                        "🔴 [{}] SIM SELL @ {} | {} | P&L ${:.4}",
                        book.name,
                        trade.price,
                        trade.reason.as_deref().unwrap_or("-"),
                        profit
                    ),
                }
                executed.push((kind, trade));
            }
        }

        executed
    }

    async fn refresh_account(&self) {
        let Some(exchange) = self.exchange.as_ref().filter(|e| e.has_credentials()) else {
            return;
        };

        match exchange.account().await {
            Ok(account) => {
                self.lab
                    .write()
                    .await
                    .apply_account(&account, quote_asset(&self.symbol));
            }
            Err(e) => debug!("Account refresh failed: {}", e),
        }
    }

    async fn journal_trades(&self, executed: &[(StrategyKind, TradeRecord)]) {
        let Some(journal) = &self.journal else {
            return;
        };
        for (kind, trade) in executed {
            if let Err(e) = journal.record(*kind, &self.symbol, trade).await {
                warn!("⚠️ Failed to journal trade {}: {}", trade.id, e);
            }
        }
    }

    /// Tick until `shutdown` flips to true
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "🚀 Trading loop started: {} every {}s",
            self.symbol, self.trading.poll_interval_secs
        );
        let poll = Duration::from_secs(self.trading.poll_interval_secs);
        let backoff = Duration::from_secs(self.trading.error_backoff_secs);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.tick().await {
                Ok(TickOutcome::Ticked { .. }) => poll,
                Ok(TickOutcome::NoData) => {
                    warn!("⚠️ No market data source, retrying in {}s", backoff.as_secs());
                    backoff
                }
                Err(e) => {
                    error!("❌ Tick failed: {}", e);
                    backoff
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.save_state().await {
            error!("❌ Failed to save lab state on shutdown: {}", e);
        }
        info!("🛑 Trading loop stopped");
    }
}
