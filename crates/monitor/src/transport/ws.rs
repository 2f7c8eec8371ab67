// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket endpoint: admission, heartbeat receive loop, removal.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::events::EventKind;
use crate::protocol::{self, Frame, Inbound};
use crate::registry::ClientSession;
use crate::state::MonitorState;

/// Query parameters for the monitor WS upgrade.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectQuery {
    /// Client identity; synthesized when absent.
    pub student: Option<String>,
    /// Display name; defaults to the identity.
    pub name: Option<String>,
    /// Launch-handshake correlation id, echoed back on pings.
    pub session: Option<String>,
}

/// `GET /ws` — WebSocket upgrade for a monitored client.
pub async fn ws_handler(
    State(state): State<Arc<MonitorState>>,
    Query(query): Query<ConnectQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query, addr))
}

/// Per-connection handler: admit, pump frames, remove exactly once.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<MonitorState>,
    query: ConnectQuery,
    addr: SocketAddr,
) {
    let identity = query
        .student
        .unwrap_or_else(|| format!("anonymous-{}", Utc::now().timestamp_millis()));
    let display_name = query.name.unwrap_or_else(|| identity.clone());

    if let Some(ref session) = query.session {
        let known = state.launches.read().await.contains_key(session);
        tracing::debug!(identity = %identity, session = %session, known, "launch correlation");
    }

    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
    let entry = state
        .registry
        .admit(identity, display_name, addr.ip().to_string(), query.session, outbound)
        .await;

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Writer task: sole owner of the sink. Exits when the outbound channel
    // closes or the socket rejects a send.
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            // Forced close: the evicting sweep already recorded the removal,
            // so just drop the socket without a close handshake.
            _ = entry.cancel.cancelled() => break,

            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_text(&state, &entry, text.as_str()).await,
                Some(Ok(Message::Binary(payload))) => {
                    tracing::info!(
                        identity = %entry.identity,
                        bytes = payload.len(),
                        "application binary payload"
                    );
                }
                Some(Ok(Message::Close(frame))) => {
                    let detail = match frame {
                        Some(f) if !f.reason.is_empty() => {
                            format!("code: {}, reason: {}", f.code, f.reason.as_str())
                        }
                        Some(f) => format!("code: {}, reason: unknown", f.code),
                        None => "connection closed".to_owned(),
                    };
                    state.registry.remove_entry(&entry, EventKind::Disconnected, detail).await;
                    break;
                }
                None => {
                    state
                        .registry
                        .remove_entry(
                            &entry,
                            EventKind::Disconnected,
                            "connection closed".to_owned(),
                        )
                        .await;
                    break;
                }
                Some(Err(e)) => {
                    state.registry.remove_entry(&entry, EventKind::Errored, e.to_string()).await;
                    break;
                }
                Some(Ok(_)) => {}
            }
        }
    }

    writer.abort();
}

/// Dispatch one inbound text payload.
async fn handle_text(state: &MonitorState, entry: &Arc<ClientSession>, text: &str) {
    match protocol::decode(text) {
        Inbound::Frame(Frame::Ping { session }) => {
            // A miss means a concurrent sweep removed this identity; the
            // cancel branch tears the loop down shortly after.
            let _ = state.registry.record_heartbeat(&entry.identity).await;
            if let Some(session) = session {
                tracing::trace!(identity = %entry.identity, session = %session, "ping correlated");
            }
            let pong = Frame::Pong { timestamp: Utc::now().to_rfc3339() };
            if !entry.send_frame(&pong) {
                tracing::debug!(identity = %entry.identity, "pong send failed");
            }
        }
        Inbound::Frame(frame) => {
            tracing::debug!(identity = %entry.identity, ?frame, "server frame from client, dropped");
        }
        Inbound::Passthrough(payload) => {
            tracing::info!(identity = %entry.identity, payload = %payload, "application message");
        }
    }
}
