// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background eviction of sessions that stopped heartbeating.

use std::sync::Arc;

use crate::events::EventKind;
use crate::state::MonitorState;

/// Spawn the single sweep task.
///
/// Sweeps never overlap: one task runs them sequentially, and a sweep that
/// outlives the interval delays the next tick instead of skipping it.
pub fn spawn_sweeper(state: Arc<MonitorState>) {
    let interval = state.config.sweep_interval();

    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            sweep(&state).await;
        }
    });
}

/// One scan-and-evict pass over the registry.
pub async fn sweep(state: &MonitorState) {
    let timeout = state.config.heartbeat_timeout();
    let entries = state.registry.entries().await;

    for entry in &entries {
        // Closed since the snapshot was taken; removal already underway.
        if entry.cancel.is_cancelled() {
            continue;
        }

        let idle = entry.idle_for().await;
        if idle <= timeout {
            continue;
        }

        // Abrupt close first, then the idempotent removal. A connection that
        // closed cleanly in between makes both calls no-ops.
        entry.cancel.cancel();
        let detail = format!("no heartbeat for {timeout:?}");
        if state.registry.remove_entry(entry, EventKind::TimedOut, detail).await {
            tracing::warn!(
                identity = %entry.identity,
                idle_ms = idle.as_millis() as u64,
                "evicted stale session"
            );
        }
    }
}
