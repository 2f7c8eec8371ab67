// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests: a real monitor on a real socket, exercised with
//! raw WebSocket clients and the keepalive driver.

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use rollcall::events::EventKind;
use rollcall_client::{ClientEvent, KeepaliveConfig};
use rollcall_specs::TestMonitor;

const TIMEOUT: Duration = Duration::from_secs(10);

async fn next_text(
    ws: &mut (impl Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin),
) -> anyhow::Result<String> {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("ws stream ended"))??;
        match msg {
            Message::Text(t) => return Ok(t.to_string()),
            Message::Close(_) => anyhow::bail!("ws closed while waiting for text"),
            _ => continue,
        }
    }
}

async fn status(monitor: &TestMonitor) -> anyhow::Result<serde_json::Value> {
    let resp = reqwest::get(format!("{}/api/status", monitor.base_url())).await?;
    Ok(resp.json().await?)
}

// -- Raw WebSocket ------------------------------------------------------------

#[tokio::test]
async fn welcome_then_ping_pong() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;

    let url = format!("{}?student=s1&name=Alice", monitor.ws_url());
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;

    let welcome: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await?)?;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["studentId"], "s1");
    assert!(welcome["serverTime"].is_string());

    ws.send(Message::Text(r#"{"type":"ping","session":"sess-1"}"#.into())).await?;
    let pong: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await?)?;
    assert_eq!(pong["type"], "pong");
    assert!(pong["timestamp"].is_string());

    let body = status(&monitor).await?;
    assert_eq!(body["totalConnected"], 1);
    assert_eq!(body["students"][0]["id"], "s1");
    assert_eq!(body["students"][0]["name"], "Alice");
    assert_eq!(body["students"][0]["ip"], "127.0.0.1");

    let logs = body["recentLogs"].as_array().cloned().unwrap_or_default();
    assert!(!logs.is_empty());
    assert_eq!(logs[logs.len() - 1]["event"], "connected");
    Ok(())
}

#[tokio::test]
async fn malformed_payload_does_not_break_heartbeats() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;

    let url = format!("{}?student=s2", monitor.ws_url());
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
    let _welcome = next_text(&mut ws).await?;

    // Application payloads pass through; the session stays up.
    ws.send(Message::Text("definitely not json".into())).await?;
    ws.send(Message::Text(r#"{"type":"chat","text":"hi"}"#.into())).await?;

    ws.send(Message::Text(r#"{"type":"ping"}"#.into())).await?;
    let pong: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await?)?;
    assert_eq!(pong["type"], "pong");

    let body = status(&monitor).await?;
    assert_eq!(body["totalConnected"], 1);
    Ok(())
}

#[tokio::test]
async fn silent_client_is_evicted() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;

    let url = format!("{}?student=quiet", monitor.ws_url());
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
    let _welcome = next_text(&mut ws).await?;
    assert_eq!(monitor.state.registry.count().await, 1);

    // No pings: timeout 3s, sweep every 1.5s.
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if monitor.state.registry.count().await == 0 {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("silent client never evicted");
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let events = monitor.state.registry.recent_events(10).await;
    let last = events.last().ok_or_else(|| anyhow::anyhow!("no events"))?;
    assert_eq!(last.kind, EventKind::TimedOut);
    assert_eq!(last.identity, "quiet");
    assert_eq!(last.total_connected, 0);
    Ok(())
}

#[tokio::test]
async fn clean_close_records_disconnect() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;

    let url = format!("{}?student=leaver", monitor.ws_url());
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
    let _welcome = next_text(&mut ws).await?;

    ws.close(None).await?;

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if monitor.state.registry.count().await == 0 {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("closed client never removed");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let events = monitor.state.registry.recent_events(10).await;
    let last = events.last().ok_or_else(|| anyhow::anyhow!("no events"))?;
    assert_eq!(last.kind, EventKind::Disconnected);
    Ok(())
}

// -- Keepalive driver ---------------------------------------------------------

#[tokio::test]
async fn driver_keeps_session_alive_past_timeout() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;

    let mut config = KeepaliveConfig::new(monitor.ws_url(), "driver-1");
    config.ping_interval = Duration::from_millis(500);
    let shutdown = CancellationToken::new();
    let mut events = rollcall_client::spawn(config, shutdown.clone());

    let connected = tokio::time::timeout(TIMEOUT, events.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("driver event stream ended"))?;
    assert_eq!(connected, ClientEvent::Connected);

    let welcome = tokio::time::timeout(TIMEOUT, events.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("driver event stream ended"))?;
    match welcome {
        ClientEvent::Welcome { student_id, .. } => assert_eq!(student_id, "driver-1"),
        other => anyhow::bail!("expected welcome, got: {other:?}"),
    }

    // Outlive the 3s timeout; the driver's pings must keep the slot fresh.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(monitor.state.registry.count().await, 1);

    // At least one pong must have come back by now.
    let mut saw_pong = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ClientEvent::Pong { .. }) {
            saw_pong = true;
        }
    }
    assert!(saw_pong, "driver never saw a pong");

    shutdown.cancel();
    Ok(())
}

#[tokio::test]
async fn driver_reconnects_after_forced_removal() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;

    let mut config = KeepaliveConfig::new(monitor.ws_url(), "driver-2");
    config.ping_interval = Duration::from_millis(300);
    config.reconnect_initial = Duration::from_millis(200);
    let shutdown = CancellationToken::new();
    let mut events = rollcall_client::spawn(config, shutdown.clone());

    // First session up.
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if monitor.state.registry.count().await == 1 {
            break;
        }
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("driver never connected");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Server-side forced removal drops the socket abruptly.
    monitor
        .state
        .registry
        .remove("driver-2", EventKind::Errored, "forced by test".to_owned())
        .await;

    // Driver must notice and reconnect.
    let mut saw_disconnect = false;
    let mut reconnected = false;
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        while let Ok(event) = events.try_recv() {
            match event {
                ClientEvent::Disconnected { .. } => saw_disconnect = true,
                ClientEvent::Connected if saw_disconnect => reconnected = true,
                _ => {}
            }
        }
        if reconnected && monitor.state.registry.count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(saw_disconnect, "driver never reported the drop");
    assert!(reconnected, "driver never reconnected");
    assert_eq!(monitor.state.registry.count().await, 1);

    shutdown.cancel();
    Ok(())
}

// -- Launch handshake ---------------------------------------------------------

#[tokio::test]
async fn launch_fields_correlate_with_connection() -> anyhow::Result<()> {
    let monitor = TestMonitor::start_fast().await?;
    let client = reqwest::Client::new();

    let resp: serde_json::Value = client
        .post(format!("{}/api/launch", monitor.base_url()))
        .json(&serde_json::json!({ "classroom": "4B", "session": "sess-7" }))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["session"], "sess-7");

    let url = format!("{}?student=s7&session=sess-7", monitor.ws_url());
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await?;
    let _welcome = next_text(&mut ws).await?;

    let body = status(&monitor).await?;
    assert_eq!(body["students"][0]["session"], "sess-7");

    let stored: serde_json::Value = client
        .get(format!("{}/api/launch/sess-7", monitor.base_url()))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(stored["classroom"], "4B");
    Ok(())
}
