//! Hybrid Crypto Trading Lab
//!
//! Runs the trading loop and dashboard, and a few operator commands.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;
use trading_lab::{
    client::{BinanceClient, Exchange},
    config::Config,
    diagnostics,
    engine::TradingEngine,
    lab::LabState,
    monitor::{start_dashboard, DashboardState},
    storage::{LabStore, TradeJournal},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "trading-lab")]
#[command(about = "Paper-trade RSI/Bollinger strategies on Binance and optionally go live")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trading loop and the dashboard
    Run {
        /// Dashboard port (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
        /// Start with live trading enabled for the selected strategy
        #[arg(long)]
        live: bool,
    },
    /// Show the saved strategy books
    Status,
    /// Test the Binance connection and API keys
    Diagnose,
    /// Show the most recent journaled trades
    History {
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run { port, live } => run_lab(config, port, live).await,
        Commands::Status => show_status(config).await,
        Commands::Diagnose => run_diagnose(config).await,
        Commands::History { limit } => show_history(config, limit).await,
    }
}

async fn run_lab(config: Config, port: Option<u16>, live: bool) -> anyhow::Result<()> {
    tracing::info!("==============================================");
    tracing::info!("🧪 Hybrid Trading Lab");
    tracing::info!("   Symbol:  {}", config.exchange.symbol);
    tracing::info!("   Amount:  {} per entry", config.trading.amount_invest);
    tracing::info!("   API key: {}", config.exchange.masked_key());
    tracing::info!("==============================================");

    let exchange: Option<Arc<dyn Exchange>> = if config.exchange.enabled {
        Some(Arc::new(BinanceClient::new(&config.exchange)?))
    } else {
        tracing::warn!("Exchange disabled, the lab will wait for market data");
        None
    };
    let has_credentials = config.exchange.has_credentials();

    let lab = LabState::new(config.trading.initial_balance).shared();
    let store = LabStore::new(&config.trading.state_file);

    let mut engine = TradingEngine::new(&config, lab.clone(), exchange.clone(), store.clone());
    if config.database.enabled {
        match TradeJournal::connect(&config.database.path).await {
            Ok(journal) => engine = engine.with_journal(journal),
            Err(e) => tracing::warn!("Trade journal disabled: {}", e),
        }
    }
    engine.load_state().await?;

    {
        let mut state = lab.write().await;
        if live {
            if has_credentials {
                state.set_live(true);
                tracing::warn!(
                    "🔴 Starting in LIVE mode with {}",
                    state.selected_strategy.display_name()
                );
            } else {
                tracing::warn!("⚠️ --live ignored: API keys not configured");
            }
        } else if state.is_live && !has_credentials {
            tracing::warn!("⚠️ Saved lab was live but API keys are missing, switching to simulation");
            state.set_live(false);
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dashboard_state = Arc::new(DashboardState::new(
        lab.clone(),
        store,
        exchange,
        config.exchange.symbol.clone(),
    ));
    let host = config.dashboard.host.clone();
    let port = port.unwrap_or(config.dashboard.port);
    let mut dashboard_rx = shutdown_rx.clone();
    let dashboard = tokio::spawn(async move {
        let signal = async move {
            let _ = dashboard_rx.wait_for(|stop| *stop).await;
        };
        if let Err(e) = start_dashboard(dashboard_state, &host, port, signal).await {
            tracing::error!("Dashboard error: {}", e);
        }
    });

    let trading = tokio::spawn(async move { engine.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    let _ = shutdown_tx.send(true);

    let _ = trading.await;
    let _ = dashboard.await;
    Ok(())
}

async fn show_status(config: Config) -> anyhow::Result<()> {
    let store = LabStore::new(&config.trading.state_file);
    let Some(saved) = store.load().await? else {
        println!("No lab data at {} yet", store.path().display());
        return Ok(());
    };

    let mut lab = LabState::new(config.trading.initial_balance);
    lab.restore(saved);

    println!("\n🧪 Trading Lab Status\n");
    println!("Selected: {}", lab.selected_strategy.display_name());
    println!("Mode:     {}", if lab.is_live { "🔴 LIVE" } else { "🟢 SIMULATION" });
    if let Some(position) = &lab.live_position {
        println!(
            "Live position: {} @ {} (since {})",
            position.qty, position.entry_price, position.entry_time
        );
    }
    println!();

    for summary in lab.summary() {
        println!(
            "{:<18} balance ${:>9.2} | P&L ${:>+8.4} ({:+.2}%) | {} closed, win rate {:.1}%",
            summary.name,
            summary.balance,
            summary.realized_pnl,
            summary.return_pct,
            summary.closed_trades,
            summary.win_rate
        );
        if let Some(position) = &summary.open_position {
            println!("{:<18} open: {} @ {}", "", position.qty, position.entry_price);
        }
    }

    Ok(())
}

async fn run_diagnose(config: Config) -> anyhow::Result<()> {
    let client = BinanceClient::new(&config.exchange)?;
    let report = diagnostics::run_diagnostics(&client, &config.exchange).await;
    println!("{}", report.render());

    if !report.is_ok() {
        anyhow::bail!("connection test failed");
    }
    Ok(())
}

async fn show_history(config: Config, limit: u32) -> anyhow::Result<()> {
    let journal = TradeJournal::connect(&config.database.path).await?;
    let entries = journal.recent(limit).await?;

    if entries.is_empty() {
        println!("No trades journaled yet");
        return Ok(());
    }

    println!("\n📜 Last {} trades\n", entries.len());
    for entry in &entries {
        println!(
            "{} {:<12} {:<9} {:<4} {} @ {}{}",
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            entry.strategy,
            entry.trade_type,
            entry.mode,
            entry.qty,
            entry.price,
            entry
                .profit
                .map(|p| format!(" | P&L {:+.4}", p))
                .unwrap_or_default()
        );
    }

    println!();
    for (strategy, profit) in journal.realized_by_strategy().await? {
        println!("{:<12} realised {:+.4}", strategy, profit);
    }

    Ok(())
}
