// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rollcall: connection liveness monitor for classroom clients.
//!
//! Clients hold a persistent WebSocket to the monitor and heartbeat on a
//! fixed cadence; the registry tracks who is alive, a background sweeper
//! evicts sessions that go silent, and a small HTTP surface exposes the
//! roster and recent lifecycle events.

pub mod config;
pub mod error;
pub mod events;
pub mod protocol;
pub mod registry;
pub mod state;
pub mod sweeper;
pub mod transport;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::state::MonitorState;
use crate::sweeper::spawn_sweeper;
use crate::transport::build_router;

/// Run the monitor server until shutdown.
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let state = Arc::new(MonitorState::new(config, shutdown.clone()));

    spawn_sweeper(Arc::clone(&state));

    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        sweep_ms = state.config.sweep_ms,
        timeout_ms = state.config.heartbeat_timeout_ms,
        "rollcall monitor listening"
    );
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    Ok(())
}
