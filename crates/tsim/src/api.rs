//! HTTP adapter over [`SimulatorHandle`]
//!
//! Health/readiness/metrics for operators, plus JSON read and write access
//! to the simulation state for display clients.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tsim_feed::ConnectionState;
use tsim_model::{Orderbook, SimulationInputs};

use crate::service::{ServiceError, SimulatorHandle};

/// Levels per side returned when the query does not ask for a count
pub const DEFAULT_LEVELS: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub feed_name: String,
    pub simulator: SimulatorHandle,
}

impl AppState {
    pub fn new(feed_name: impl Into<String>, simulator: SimulatorHandle) -> Self {
        Self {
            feed_name: feed_name.into(),
            simulator,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub feed: String,
    pub connected: bool,
}

#[derive(Serialize)]
pub struct OrderbookResponse {
    #[serde(flatten)]
    pub book: Orderbook,
    pub mid_price: f64,
    pub spread: Option<Decimal>,
    /// Computed on the full book, not the returned slice
    pub depth: usize,
    pub liquidity: f64,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub feed: String,
    pub feed_state: &'static str,
    pub connected: bool,
    pub status: String,
    pub books_received: u64,
    pub message_interval_ms: f64,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct OrderbookQuery {
    pub levels: Option<usize>,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        feed: state.feed_name.clone(),
        connected: state.simulator.is_connected(),
    })
}

/// GET /ready - 200 only while the feed is connected
async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connected = state.simulator.is_connected();
    let status_code = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if connected { "ready" } else { "not_ready" }.to_string(),
            feed: state.feed_name.clone(),
            connected,
        }),
    )
}

/// GET /metrics
async fn metrics() -> impl IntoResponse {
    match tsim_feed::encode_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding error: {}", e),
        )
            .into_response(),
    }
}

/// GET /orderbook?levels=N
async fn orderbook(
    State(state): State<AppState>,
    Query(query): Query<OrderbookQuery>,
) -> impl IntoResponse {
    let Some(book) = state.simulator.current_orderbook() else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "no live order book"})),
        )
            .into_response();
    };

    let levels = query.levels.unwrap_or(DEFAULT_LEVELS);
    (
        StatusCode::OK,
        Json(OrderbookResponse {
            mid_price: book.mid_price(),
            spread: book.spread(),
            depth: book.depth(),
            liquidity: book.liquidity(),
            book: book.top_levels(levels),
        }),
    )
        .into_response()
}

/// GET /outputs
async fn outputs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.simulator.current_outputs())
}

/// GET /inputs
async fn get_inputs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.simulator.current_inputs())
}

/// PUT /inputs - omitted fields take their defaults
async fn put_inputs(
    State(state): State<AppState>,
    Json(inputs): Json<SimulationInputs>,
) -> impl IntoResponse {
    match state.simulator.set_inputs(inputs).await {
        Ok(()) => {
            let view = state.simulator.view();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "inputs": view.inputs,
                    "outputs": view.outputs,
                })),
            )
                .into_response()
        }
        Err(ServiceError::InvalidInputs(e)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
        Err(ServiceError::Stopped) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "simulator stopped"})),
        )
            .into_response(),
    }
}

/// GET /status
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let view = state.simulator.view();
    Json(StatusResponse {
        feed: state.feed_name.clone(),
        feed_state: state_name(state.simulator.feed().state()),
        connected: view.connected,
        status: view.status,
        books_received: view.books_received,
        message_interval_ms: view.message_interval_ms,
        updated_at: view.updated_at,
    })
}

/// POST /connect
async fn connect(State(state): State<AppState>) -> impl IntoResponse {
    state.simulator.connect();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "connecting"})),
    )
}

/// POST /disconnect
async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    state.simulator.disconnect();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "disconnecting"})),
    )
}

fn state_name(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Idle => "idle",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "open",
        ConnectionState::Closing => "closing",
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .route("/orderbook", get(orderbook))
        .route("/outputs", get(outputs))
        .route("/inputs", get(get_inputs).put(put_inputs))
        .route("/status", get(status))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .with_state(state)
}

/// Serve the router until `shutdown` resolves
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "HTTP server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{book_json, spawn_simulator, wait_for};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn app_with(frames: Vec<String>) -> (Router, SimulatorHandle) {
        let (simulator, _tasks) = spawn_simulator(frames).await;
        let router = create_router(AppState::new("okx:REPLAY", simulator.clone()));
        (router, simulator)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn put_inputs_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("PUT")
            .uri("/inputs")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let (app, _sim) = app_with(vec![]).await;
        let response = app.oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_ready_follows_connection() {
        let (app, sim) = app_with(vec![]).await;
        wait_for(&sim, |v| v.connected).await;
        let response = app.clone().oneshot(get_request("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        sim.disconnect();
        wait_for(&sim, |v| !v.connected).await;
        let response = app.oneshot(get_request("/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let frames = vec![book_json("t1", &[("100", "1")], &[("99", "1")])];
        let (app, sim) = app_with(frames).await;
        wait_for(&sim, |v| v.books_received == 1).await;

        let response = app.oneshot(get_request("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("tsim_feed_messages_total"));
        assert!(text.contains("tsim_recomputes_total"));
    }

    #[tokio::test]
    async fn test_orderbook_not_found_before_first_book() {
        let (app, _sim) = app_with(vec![]).await;
        let response = app.oneshot(get_request("/orderbook")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_orderbook_levels_and_summary() {
        let asks = [("100", "1"), ("101", "2"), ("102", "3")];
        let bids = [("99", "1"), ("98", "2"), ("97", "3")];
        let (app, sim) = app_with(vec![book_json("t1", &asks, &bids)]).await;
        wait_for(&sim, |v| v.books_received == 1).await;

        let response = app.oneshot(get_request("/orderbook?levels=2")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;

        assert_eq!(json["timestamp"], "t1");
        assert_eq!(json["asks"].as_array().unwrap().len(), 2);
        assert_eq!(json["bids"].as_array().unwrap().len(), 2);
        assert_eq!(json["asks"][0][0], "100");
        assert_eq!(json["depth"], 3);
        assert_eq!(json["mid_price"], 99.5);
        assert_eq!(json["spread"], "1");
    }

    #[tokio::test]
    async fn test_outputs_after_book() {
        let frames = vec![book_json("t9", &[("100", "10")], &[("99", "10")])];
        let (app, sim) = app_with(frames).await;
        wait_for(&sim, |v| v.books_received == 1).await;

        let response = app.oneshot(get_request("/outputs")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["timestamp"], "t9");
        assert!(json["expected_fees"].as_f64().unwrap() > 0.0);
        assert!(json.get("internal_latency_ms").is_some());
    }

    #[tokio::test]
    async fn test_put_inputs_accepts_valid() {
        let (app, sim) = app_with(vec![]).await;
        let response = app
            .clone()
            .oneshot(put_inputs_request(
                r#"{"quantity":250.0,"volatility":0.1,"fee_tier":"VIP4"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["inputs"]["fee_tier"], "VIP4");

        assert_eq!(sim.current_inputs().quantity, 250.0);
        let response = app.oneshot(get_request("/inputs")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["volatility"], 0.1);
    }

    #[tokio::test]
    async fn test_put_inputs_rejects_invalid() {
        let (app, sim) = app_with(vec![]).await;
        let response = app
            .oneshot(put_inputs_request(r#"{"exchange":"Binance"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Binance"));
        assert_eq!(sim.current_inputs(), SimulationInputs::default());
    }

    #[tokio::test]
    async fn test_status_and_disconnect() {
        let (app, sim) = app_with(vec![]).await;
        wait_for(&sim, |v| v.connected).await;

        let response = app.clone().oneshot(get_request("/status")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["connected"], true);
        assert_eq!(json["feed"], "okx:REPLAY");
        assert_eq!(json["feed_state"], "open");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/disconnect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        wait_for(&sim, |v| !v.connected).await;
    }
}
