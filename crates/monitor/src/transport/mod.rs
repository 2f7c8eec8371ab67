// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the monitor.

pub mod http;
pub mod ws;

use std::sync::Arc;

use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::MonitorState;

/// Embedded dashboard page.
const DASHBOARD_HTML: &str = include_str!("../web/dashboard.html");
/// Embedded browser keepalive driver.
const WS_CLIENT_JS: &str = include_str!("../web/ws-client.js");

/// Build the axum `Router` with all monitor routes.
pub fn build_router(state: Arc<MonitorState>) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(http::health))
        // Roster + recent events
        .route("/api/status", get(http::status))
        // Launch handshake lookup table
        .route("/api/launch", post(http::launch))
        .route("/api/launch/{session}", get(http::launch_lookup))
        // Persistent client connections
        .route("/ws", get(ws::ws_handler))
        // Static assets
        .route("/", get(|| async { Html(DASHBOARD_HTML) }))
        .route("/ws-client.js", get(ws_client_js))
        // Middleware
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn ws_client_js() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], WS_CLIENT_JS)
}
