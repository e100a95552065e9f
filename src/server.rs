//! HTTP/WebSocket surface of the agent.
//!
//! Two operations are exposed:
//! - `POST /predict` — synchronous on-demand prediction for an explicit
//!   `(elapsedtime, velocity)` pair against the current trailing window
//! - `GET /ws` — WebSocket subscription to the periodic snapshot broadcast
//!
//! plus the usual `GET /health`. Errors on the request path are structured
//! `{error, code}` payloads; the broadcast path never surfaces errors to
//! subscribers, it degrades per reading upstream.

use crate::broadcast::Broadcaster;
use crate::core::predictor::Predictor;
use crate::ondemand::{predict_on_demand, PredictError, PredictRequest};
use crate::storage::ReadingStore;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Window size for on-demand predictions
    pub window_size: usize,
}

impl ServerConfig {
    pub fn new(port: u16, window_size: usize) -> Self {
        Self { port, window_size }
    }
}

/// Shared server state
pub struct ServerState {
    /// Reading history, shared with the broadcaster
    pub store: Arc<dyn ReadingStore>,
    /// Prediction model
    pub predictor: Arc<dyn Predictor>,
    /// Snapshot fan-out for WebSocket subscribers
    pub broadcaster: Arc<Broadcaster>,
    /// Window size for on-demand predictions
    window_size: usize,
}

impl ServerState {
    pub fn new(
        config: &ServerConfig,
        store: Arc<dyn ReadingStore>,
        predictor: Arc<dyn Predictor>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            store,
            predictor,
            broadcaster,
            window_size: config.window_size,
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Successful prediction response
#[derive(Serialize)]
pub struct PredictResponse {
    pub prediction: f64,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_payload(err: &PredictError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, code) = match err {
        PredictError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        PredictError::InsufficientData { .. } => (StatusCode::BAD_REQUEST, "INSUFFICIENT_DATA"),
        PredictError::Prediction(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PREDICTION_ERROR"),
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /predict
async fn predict(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<ErrorResponse>)> {
    let prediction = predict_on_demand(
        state.store.as_ref(),
        state.predictor.as_ref(),
        state.window_size,
        &request,
    )
    .map_err(|e| {
        tracing::info!(error = %e, "predict request refused");
        error_payload(&e)
    })?;

    tracing::info!(prediction, "on-demand prediction served");
    Ok(Json(PredictResponse { prediction }))
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward every broadcast snapshot to one subscriber as a JSON text frame.
async fn handle_socket(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut snapshots = state.broadcaster.subscribe();
    tracing::info!("websocket subscriber connected");

    loop {
        match snapshots.recv().await {
            Ok(snapshot) => {
                let frame = match serde_json::to_string(&snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(error = %e, "snapshot serialization failed");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame)).await.is_err() {
                    break;
                }
            }
            // Slow consumer: skip ahead to the next tick
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "websocket subscriber lagging");
            }
            Err(RecvError::Closed) => break,
        }
    }

    tracing::info!("websocket subscriber disconnected");
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    state: ServerState,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/ws", get(ws_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(Arc::new(state));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("viscostream server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("server shutdown signal received");
            })
            .await
        {
            tracing::error!("server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
