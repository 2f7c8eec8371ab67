// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::registry::Registry;

/// Shared monitor state.
pub struct MonitorState {
    pub registry: Registry,
    /// Opaque launch-handshake records, keyed by session id.
    pub launches: RwLock<HashMap<String, serde_json::Value>>,
    pub config: MonitorConfig,
    pub shutdown: CancellationToken,
}

impl MonitorState {
    pub fn new(config: MonitorConfig, shutdown: CancellationToken) -> Self {
        Self { registry: Registry::new(), launches: RwLock::new(HashMap::new()), config, shutdown }
    }
}
