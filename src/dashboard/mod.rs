//! Dashboard surface: a small read-only HTTP API plus the live observer
//! feed over WebSocket.

mod ws;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::ledger::{BurnStats, Ledger};

#[derive(Clone)]
pub struct DashboardState {
    pub ledger: Arc<Ledger>,
}

/// Binds the dashboard server and serves it on a background task.
pub async fn start_server(ledger: Arc<Ledger>, port: u16) -> Result<tokio::task::JoinHandle<()>> {
    let app = create_app(DashboardState { ledger });

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {}", port))?;
    info!("Dashboard listening on {}", addr);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Dashboard server error: {}", e);
        }
    });

    Ok(handle)
}

fn create_app(state: DashboardState) -> Router {
    Router::new()
        .route("/api/stats", get(stats_handler))
        .route("/api/health", get(health_handler))
        .route("/ws", get(ws::websocket_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn stats_handler(State(state): State<DashboardState>) -> Json<BurnStats> {
    Json(state.ledger.stats())
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}
