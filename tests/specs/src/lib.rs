// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for end-to-end monitor tests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use rollcall::config::MonitorConfig;
use rollcall::state::MonitorState;
use rollcall::sweeper::spawn_sweeper;
use rollcall::transport::build_router;

/// A monitor server bound to an ephemeral port for one test.
pub struct TestMonitor {
    pub addr: SocketAddr,
    pub state: Arc<MonitorState>,
    shutdown: CancellationToken,
}

impl TestMonitor {
    /// Start with the fast preset (1.5s sweep / 3s timeout) so eviction
    /// tests finish quickly.
    pub async fn start_fast() -> anyhow::Result<Self> {
        Self::start(MonitorConfig {
            host: "127.0.0.1".into(),
            port: 0,
            sweep_ms: 1500,
            heartbeat_timeout_ms: 3000,
        })
        .await
    }

    pub async fn start(config: MonitorConfig) -> anyhow::Result<Self> {
        let shutdown = CancellationToken::new();
        let state = Arc::new(MonitorState::new(config, shutdown.clone()));

        spawn_sweeper(Arc::clone(&state));

        let router = build_router(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let serve_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(serve_shutdown.cancelled_owned())
            .await;
        });

        Ok(Self { addr, state, shutdown })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

impl Drop for TestMonitor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
