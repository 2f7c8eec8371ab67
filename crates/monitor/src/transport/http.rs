// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the monitor API.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::MonitorError;
use crate::events::EventLogEntry;
use crate::state::MonitorState;

/// Number of event-log entries returned by `/api/status`.
const STATUS_LOG_WINDOW: usize = 50;

// -- Response types -----------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub total_connected: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub id: String,
    pub name: String,
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_ping: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub total_connected: usize,
    pub students: Vec<StudentInfo>,
    pub recent_logs: Vec<EventLogEntry>,
}

#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub session: String,
    pub stored: bool,
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/health`
pub async fn health(State(s): State<Arc<MonitorState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "running".to_owned(),
        total_connected: s.registry.count().await,
    })
}

/// `GET /api/status` — live roster plus the recent event window.
pub async fn status(State(s): State<Arc<MonitorState>>) -> impl IntoResponse {
    let students: Vec<StudentInfo> = s
        .registry
        .snapshot()
        .await
        .into_iter()
        .map(|session| StudentInfo {
            id: session.identity,
            name: session.display_name,
            ip: session.remote_addr,
            session: session.launch_session,
            connected_at: session.connected_at,
            last_ping: session.last_heartbeat_at,
        })
        .collect();

    let recent_logs = s.registry.recent_events(STATUS_LOG_WINDOW).await;

    Json(StatusResponse { total_connected: students.len(), students, recent_logs })
}

/// `POST /api/launch` — store opaque launch-handshake fields.
///
/// The payload is not interpreted beyond the optional `session` key; the
/// whole object is kept verbatim for later lookup.
pub async fn launch(
    State(s): State<Arc<MonitorState>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    if !body.is_object() {
        return MonitorError::BadRequest
            .to_http_response("launch payload must be a JSON object")
            .into_response();
    }

    let session = body
        .get("session")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    s.launches.write().await.insert(session.clone(), body);
    tracing::info!(session = %session, "launch handshake stored");

    Json(LaunchResponse { session, stored: true }).into_response()
}

/// `GET /api/launch/{session}` — fetch stored launch fields.
pub async fn launch_lookup(
    State(s): State<Arc<MonitorState>>,
    Path(session): Path<String>,
) -> impl IntoResponse {
    match s.launches.read().await.get(&session) {
        Some(fields) => Json(fields.clone()).into_response(),
        None => {
            MonitorError::LaunchNotFound.to_http_response("unknown launch session").into_response()
        }
    }
}
