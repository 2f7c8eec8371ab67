// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the rollcall monitor server.
///
/// Sweep cadence and heartbeat timeout are deployment choices, not
/// constants: a classroom deployment runs the relaxed 15s/30s pairing,
/// local smoke setups run 1.5s/3s.
#[derive(Debug, Clone, clap::Parser)]
pub struct MonitorConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "ROLLCALL_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 3000, env = "ROLLCALL_PORT")]
    pub port: u16,

    /// Expiry sweep interval in milliseconds.
    #[arg(long, default_value_t = 15_000, env = "ROLLCALL_SWEEP_MS")]
    pub sweep_ms: u64,

    /// Heartbeat timeout in milliseconds. Sessions silent for longer than
    /// this are evicted on the next sweep.
    #[arg(long, default_value_t = 30_000, env = "ROLLCALL_TIMEOUT_MS")]
    pub heartbeat_timeout_ms: u64,
}

impl MonitorConfig {
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.sweep_ms)
    }

    pub fn heartbeat_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.heartbeat_timeout_ms)
    }
}
