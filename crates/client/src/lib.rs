// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keepalive driver for rollcall clients.
//!
//! Connects to a monitor, announces identity via query parameters, sends
//! `ping` on a fixed cadence, and surfaces connection status and passthrough
//! messages as events. Reconnects with exponential backoff until shutdown.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use rollcall::protocol::{self, Frame, Inbound};

/// Configuration for the keepalive driver.
#[derive(Debug, Clone)]
pub struct KeepaliveConfig {
    /// Monitor WS endpoint, e.g. `ws://127.0.0.1:3000/ws`.
    pub url: String,
    /// Identity announced at connect time.
    pub student_id: String,
    /// Display name; the server defaults it to the identity when unset.
    pub display_name: Option<String>,
    /// Launch-handshake correlation id, echoed on every ping.
    pub session: Option<String>,
    /// Ping cadence.
    pub ping_interval: Duration,
    /// First reconnect delay; doubles per failed attempt up to
    /// `reconnect_max`, resets after a session that got connected.
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl KeepaliveConfig {
    pub fn new(url: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            student_id: student_id.into(),
            display_name: None,
            session: None,
            ping_interval: Duration::from_millis(1000),
            reconnect_initial: Duration::from_millis(500),
            reconnect_max: Duration::from_secs(15),
        }
    }
}

/// Events surfaced by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connected,
    Welcome { student_id: String, server_time: String },
    Pong { timestamp: String },
    /// Non-heartbeat payload, passed through unmodified.
    Message(String),
    Disconnected { reason: String },
}

/// How one connected session ended.
enum SessionEnd {
    Shutdown,
    Lost(String),
}

/// Spawn the driver; events arrive on the returned receiver until shutdown.
pub fn spawn(
    config: KeepaliveConfig,
    shutdown: CancellationToken,
) -> mpsc::UnboundedReceiver<ClientEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        run(config, shutdown, tx).await;
    });
    rx
}

/// Run the keepalive loop until shutdown: connect, ping, reconnect on drop.
pub async fn run(
    config: KeepaliveConfig,
    shutdown: CancellationToken,
    events: mpsc::UnboundedSender<ClientEvent>,
) {
    let mut delay = config.reconnect_initial;

    loop {
        if shutdown.is_cancelled() {
            return;
        }

        match session(&config, &shutdown, &events).await {
            Ok(SessionEnd::Shutdown) => return,
            Ok(SessionEnd::Lost(reason)) => {
                let _ = events.send(ClientEvent::Disconnected { reason: reason.clone() });
                debug!(reason = %reason, "monitor connection lost");
                delay = config.reconnect_initial;
            }
            Err(e) => {
                let _ = events.send(ClientEvent::Disconnected { reason: e.to_string() });
                debug!(err = %e, "monitor connect failed, retrying in {:?}", delay);
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown.cancelled() => return,
        }
        delay = (delay * 2).min(config.reconnect_max);
    }
}

/// One connected session: ping ticker plus inbound pump.
async fn session(
    config: &KeepaliveConfig,
    shutdown: &CancellationToken,
    events: &mpsc::UnboundedSender<ClientEvent>,
) -> anyhow::Result<SessionEnd> {
    let url = connect_url(config);
    let (ws, _resp) = tokio_tungstenite::connect_async(url.as_str()).await?;
    info!(url = %url, "connected to monitor");
    let _ = events.send(ClientEvent::Connected);

    let (mut tx, mut rx) = ws.split();
    let mut ticker = tokio::time::interval(config.ping_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick completes immediately; the cadence starts one interval
    // after connect.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = tx.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }

            _ = ticker.tick() => {
                let ping = Frame::Ping { session: config.session.clone() };
                if tx.send(Message::Text(protocol::encode(&ping).into())).await.is_err() {
                    return Ok(SessionEnd::Lost("ping send failed".to_owned()));
                }
            }

            msg = rx.next() => match msg {
                Some(Ok(Message::Text(text))) => handle_text(text.as_str(), events),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_owned())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed".to_owned());
                    return Ok(SessionEnd::Lost(reason));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Ok(SessionEnd::Lost(e.to_string())),
                None => return Ok(SessionEnd::Lost("connection dropped".to_owned())),
            }
        }
    }
}

/// Dispatch one inbound text payload.
fn handle_text(text: &str, events: &mpsc::UnboundedSender<ClientEvent>) {
    match protocol::decode(text) {
        Inbound::Frame(Frame::Welcome { student_id, server_time }) => {
            let _ = events.send(ClientEvent::Welcome { student_id, server_time });
        }
        Inbound::Frame(Frame::Pong { timestamp }) => {
            let _ = events.send(ClientEvent::Pong { timestamp });
        }
        Inbound::Frame(Frame::Ping { .. }) => {
            debug!("unexpected ping from server, dropped");
        }
        Inbound::Passthrough(payload) => {
            let _ = events.send(ClientEvent::Message(payload));
        }
    }
}

/// Build the connect URL with identity, display name, and correlation id.
fn connect_url(config: &KeepaliveConfig) -> String {
    let mut url = format!("{}?student={}", config.url, config.student_id);
    if let Some(ref name) = config.display_name {
        url.push_str(&format!("&name={name}"));
    }
    if let Some(ref session) = config.session {
        url.push_str(&format!("&session={session}"));
    }
    url
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
