//! Dashboard HTTP API
//!
//! Serves the lab state to the browser page and accepts the operator's
//! strategy selection and live-mode switch.

use crate::client::Exchange;
use crate::lab::{BookSummary, LabState, SharedLab};
use crate::storage::LabStore;
use crate::strategy::StrategyKind;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

const INDEX_HTML: &str = include_str!("index.html");

/// Dashboard state shared across handlers
pub struct DashboardState {
    pub lab: SharedLab,
    pub store: LabStore,
    pub exchange: Option<Arc<dyn Exchange>>,
    pub symbol: String,
}

impl DashboardState {
    pub fn new(
        lab: SharedLab,
        store: LabStore,
        exchange: Option<Arc<dyn Exchange>>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            lab,
            store,
            exchange,
            symbol: symbol.into(),
        }
    }

    fn has_credentials(&self) -> bool {
        self.exchange.as_ref().is_some_and(|e| e.has_credentials())
    }

    async fn persist(&self, lab: &LabState) {
        if let Err(e) = self.store.save(&lab.to_persisted()).await {
            error!("❌ Failed to save lab state: {}", e);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SelectStrategyRequest {
    pub strategy: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleLiveRequest {
    #[serde(default)]
    pub is_live: bool,
}

type ApiResponse = (StatusCode, Json<Value>);

// ============ HTTP API Handlers ============

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Full lab state
async fn get_status(State(state): State<Arc<DashboardState>>) -> Json<LabState> {
    let lab = state.lab.read().await;
    Json(lab.clone())
}

/// Per-strategy performance
async fn get_summary(State(state): State<Arc<DashboardState>>) -> Json<Vec<BookSummary>> {
    let lab = state.lab.read().await;
    Json(lab.summary())
}

async fn select_strategy(
    State(state): State<Arc<DashboardState>>,
    Json(request): Json<SelectStrategyRequest>,
) -> ApiResponse {
    let kind: StrategyKind = match request.strategy.parse() {
        Ok(kind) => kind,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "error": "invalid strategy" })),
            )
        }
    };

    let mut lab = state.lab.write().await;
    lab.select_strategy(kind);
    state.persist(&lab).await;
    info!("🎯 Selected strategy: {}", kind.display_name());

    (
        StatusCode::OK,
        Json(json!({ "success": true, "selected": kind })),
    )
}

async fn toggle_live(
    State(state): State<Arc<DashboardState>>,
    Json(request): Json<ToggleLiveRequest>,
) -> ApiResponse {
    if request.is_live && !state.has_credentials() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "API keys not configured" })),
        );
    }

    let mut lab = state.lab.write().await;
    lab.set_live(request.is_live);
    state.persist(&lab).await;

    if request.is_live {
        warn!("==============================================");
        warn!("🔴 LIVE MODE ENABLED");
        warn!("   Strategy: {}", lab.selected_strategy.display_name());
        warn!("   Real market orders will be placed on {}", state.symbol);
        warn!("==============================================");
    } else {
        info!("🟢 Live mode disabled, simulation only");
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "is_live": request.is_live })),
    )
}

/// Account balances, trades and orders straight from the exchange
async fn export_data(State(state): State<Arc<DashboardState>>) -> ApiResponse {
    let Some(exchange) = state.exchange.as_ref().filter(|e| e.has_credentials()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "API keys not configured" })),
        );
    };

    match collect_export(exchange.as_ref(), &state.symbol).await {
        Ok(data) => (StatusCode::OK, Json(data)),
        Err(e) => {
            error!("❌ Export failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

async fn collect_export(exchange: &dyn Exchange, symbol: &str) -> crate::error::Result<Value> {
    let account = exchange.account().await?;
    let my_trades = exchange.my_trades(symbol).await?;
    let open_orders = exchange.open_orders(symbol).await?;
    let order_history = exchange.all_orders(symbol).await?;

    Ok(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "symbol": symbol,
        "account_balance": account.non_zero_balances(),
        "my_trades": my_trades,
        "open_orders": open_orders,
        "order_history": order_history,
        "note": "Real account data exported from Binance",
    }))
}

/// Create dashboard router
pub fn create_router(state: Arc<DashboardState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/summary", get(get_summary))
        .route("/api/select_strategy", post(select_strategy))
        .route("/api/toggle_live", post(toggle_live))
        .route("/api/export_data", get(export_data))
        .with_state(state)
}

/// Start dashboard server
pub async fn start_dashboard<F>(
    state: Arc<DashboardState>,
    host: &str,
    port: u16,
    shutdown: F,
) -> crate::error::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("🌐 Dashboard listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockExchange;
    use crate::error::BotError;
    use crate::types::{AccountInfo, AssetBalance};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn state(dir: &TempDir, exchange: Option<MockExchange>) -> Arc<DashboardState> {
        Arc::new(DashboardState::new(
            LabState::new(dec!(100)).shared(),
            LabStore::new(dir.path().join("lab_data.json")),
            exchange.map(|m| Arc::new(m) as Arc<dyn Exchange>),
            "BTC/USDT",
        ))
    }

    fn keyed_exchange() -> MockExchange {
        let mut mock = MockExchange::new();
        mock.expect_has_credentials().return_const(true);
        mock
    }

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[tokio::test]
    async fn test_index_page_polls_status() {
        let Html(page) = index().await;
        assert!(page.contains("/api/status"));
    }

    #[tokio::test]
    async fn test_status_is_full_lab() {
        let dir = tempfile::tempdir().unwrap();
        let Json(lab) = get_status(State(state(&dir, None))).await;
        let value = serde_json::to_value(&lab).unwrap();
        assert_eq!(value["status"], "Running");
        assert_eq!(value["selected_strategy"], "conservative");
        assert!(value["strategies"]["rsi_pure"].is_object());
    }

    #[tokio::test]
    async fn test_summary_lists_every_book() {
        let dir = tempfile::tempdir().unwrap();
        let Json(summary) = get_summary(State(state(&dir, None))).await;
        assert_eq!(summary.len(), 3);
    }

    #[tokio::test]
    async fn test_select_strategy_persists() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, None);

        let (status, Json(body)) = select_strategy(
            State(state.clone()),
            Json(SelectStrategyRequest {
                strategy: "rsi_pure".to_string(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["selected"], "rsi_pure");
        assert_eq!(state.lab.read().await.selected_strategy, StrategyKind::RsiPure);

        let saved = state.store.load().await.unwrap().unwrap();
        assert_eq!(saved.selected_strategy, StrategyKind::RsiPure);
    }

    #[tokio::test]
    async fn test_select_unknown_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, None);

        let (status, Json(body)) = select_strategy(
            State(state.clone()),
            Json(SelectStrategyRequest {
                strategy: "yolo".to_string(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "success": false, "error": "invalid strategy" }));
        assert_eq!(
            state.lab.read().await.selected_strategy,
            StrategyKind::Conservative
        );
    }

    #[tokio::test]
    async fn test_toggle_live_requires_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockExchange::new();
        mock.expect_has_credentials().return_const(false);
        let state = state(&dir, Some(mock));

        let (status, Json(body)) =
            toggle_live(State(state.clone()), Json(ToggleLiveRequest { is_live: true })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "API keys not configured");
        assert!(!state.lab.read().await.is_live);
    }

    #[tokio::test]
    async fn test_toggle_live_on_and_off() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, Some(keyed_exchange()));

        let (status, Json(body)) =
            toggle_live(State(state.clone()), Json(ToggleLiveRequest { is_live: true })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "is_live": true }));
        assert!(state.lab.read().await.is_live);
        assert!(state.store.load().await.unwrap().unwrap().is_live);

        // a missing flag means off
        let request: ToggleLiveRequest = serde_json::from_str("{}").unwrap();
        let (_, Json(body)) = toggle_live(State(state.clone()), Json(request)).await;
        assert_eq!(body["is_live"], false);
        assert!(!state.lab.read().await.is_live);
    }

    #[tokio::test]
    async fn test_disabling_live_needs_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(&dir, None);
        let (status, _) =
            toggle_live(State(state), Json(ToggleLiveRequest { is_live: false })).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_export_without_keys() {
        let dir = tempfile::tempdir().unwrap();
        let (status, Json(body)) = export_data(State(state(&dir, None))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_export_collects_account_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = keyed_exchange();
        mock.expect_account().returning(|| {
            Ok(AccountInfo {
                uid: None,
                account_type: "SPOT".to_string(),
                can_trade: true,
                can_withdraw: true,
                permissions: vec![],
                maker_commission: dec!(10),
                taker_commission: dec!(10),
                balances: vec![AssetBalance {
                    asset: "USDT".to_string(),
                    free: dec!(40),
                    locked: dec!(2),
                }],
            })
        });
        mock.expect_my_trades().returning(|_| Ok(json!([{ "id": 1 }])));
        mock.expect_open_orders().returning(|_| Ok(json!([])));
        mock.expect_all_orders().returning(|_| Ok(json!([{ "orderId": 5 }])));

        let (status, Json(body)) = export_data(State(state(&dir, Some(mock)))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "BTC/USDT");
        assert_eq!(body["my_trades"][0]["id"], 1);
        assert_eq!(body["order_history"][0]["orderId"], 5);
        assert!(body["open_orders"].as_array().unwrap().is_empty());
        assert!(body["account_balance"]["USDT"].is_string());
        assert!(body["timestamp"].is_string());
        assert!(body["note"].is_string());
    }

    #[tokio::test]
    async fn test_export_exchange_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = keyed_exchange();
        mock.expect_account()
            .returning(|| Err(BotError::Auth("Signature for this request is not valid".into())));

        let (status, Json(body)) = export_data(State(state(&dir, Some(mock)))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Signature"));
    }

    #[test]
    fn test_router_builds() {
        let dir = tempfile::tempdir().unwrap();
        let _router = create_router(state(&dir, None));
    }
}
