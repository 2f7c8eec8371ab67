// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection registry: the authoritative set of live client sessions.
//!
//! All workers interact with the live-set through this API. Mutations
//! (admit, heartbeat receipt, removal) serialize on a single write guard;
//! snapshot and count reads run concurrently and observe whole entries only.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::events::{EventKind, EventLog, EventLogEntry};
use crate::protocol::{self, Frame};

/// Last observed heartbeat, on both clocks: monotonic for expiry math,
/// wall for reporting.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub at: Instant,
    pub wall: DateTime<Utc>,
}

/// One live connection. The registry owns the authoritative slot; the
/// connection's receive loop holds an `Arc` for the lifetime of the socket.
pub struct ClientSession {
    pub identity: String,
    pub display_name: String,
    pub remote_addr: String,
    /// Launch-handshake correlation id, when the client supplied one.
    pub launch_session: Option<String>,
    pub connected_at: DateTime<Utc>,
    last_beat: RwLock<Heartbeat>,
    /// Encoded frames queued here are written to the socket by the
    /// connection's writer task. Sends never block; a closed channel means
    /// the transport is already gone.
    outbound: UnboundedSender<String>,
    /// Cancelled to force-close the transport.
    pub cancel: CancellationToken,
}

impl ClientSession {
    /// Queue an encoded frame for the writer task. Fire-and-forget: returns
    /// whether the frame was accepted, never blocks or retries.
    pub fn send_frame(&self, frame: &Frame) -> bool {
        self.outbound.send(protocol::encode(frame)).is_ok()
    }

    pub async fn last_heartbeat(&self) -> Heartbeat {
        *self.last_beat.read().await
    }

    /// Time since the last heartbeat (monotonic).
    pub async fn idle_for(&self) -> Duration {
        self.last_beat.read().await.at.elapsed()
    }
}

/// Point-in-time view of one session, safe to hand to observers.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub identity: String,
    pub display_name: String,
    pub remote_addr: String,
    pub launch_session: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

struct Inner {
    sessions: HashMap<String, Arc<ClientSession>>,
    events: EventLog,
}

/// The registry itself. Holds the session map and the event ring behind one
/// lock so every mutation and its event append are a single atomic step.
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner { sessions: HashMap::new(), events: EventLog::new() }) }
    }

    /// Insert-or-replace the entry for `identity` and dispatch the one-time
    /// `welcome` frame. A colliding identity replaces the prior slot without
    /// cancelling the prior connection: the orphan self-terminates on its own
    /// transport failure or a later sweep, and its removal call becomes a
    /// no-op against the replacement.
    pub async fn admit(
        &self,
        identity: String,
        display_name: String,
        remote_addr: String,
        launch_session: Option<String>,
        outbound: UnboundedSender<String>,
    ) -> Arc<ClientSession> {
        let wall = Utc::now();
        let session = Arc::new(ClientSession {
            identity,
            display_name,
            remote_addr,
            launch_session,
            connected_at: wall,
            last_beat: RwLock::new(Heartbeat { at: Instant::now(), wall }),
            outbound,
            cancel: CancellationToken::new(),
        });

        {
            let mut inner = self.inner.write().await;
            inner.sessions.insert(session.identity.clone(), Arc::clone(&session));
            let total = inner.sessions.len();
            push_event(
                &mut inner.events,
                &session,
                EventKind::Connected,
                format!("from {}", session.remote_addr),
                total,
            );
        }

        let welcome = Frame::Welcome {
            student_id: session.identity.clone(),
            server_time: wall.to_rfc3339(),
        };
        if !session.send_frame(&welcome) {
            tracing::debug!(identity = %session.identity, "welcome send failed");
        }

        session
    }

    /// Stamp the last-seen heartbeat for `identity`. Returns false when the
    /// identity is absent, which is expected when a sweep removed it
    /// concurrently; the caller treats it as a no-op, not an error.
    pub async fn record_heartbeat(&self, identity: &str) -> bool {
        let inner = self.inner.read().await;
        let Some(session) = inner.sessions.get(identity) else {
            return false;
        };
        let mut beat = session.last_beat.write().await;
        beat.at = Instant::now();
        beat.wall = Utc::now();
        true
    }

    /// Delete the entry for `identity` if present, cancelling its transport
    /// and appending an event with the post-removal count. Idempotent.
    pub async fn remove(&self, identity: &str, kind: EventKind, detail: String) -> bool {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.remove(identity) else {
            return false;
        };
        session.cancel.cancel();
        let total = inner.sessions.len();
        push_event(&mut inner.events, &session, kind, detail, total);
        true
    }

    /// Pointer-guarded removal: deletes the slot only while it still holds
    /// this exact session. An orphaned connection (identity replaced) or a
    /// sweep working from a stale snapshot can never remove the replacement.
    pub async fn remove_entry(
        &self,
        session: &Arc<ClientSession>,
        kind: EventKind,
        detail: String,
    ) -> bool {
        let mut inner = self.inner.write().await;
        let current = match inner.sessions.get(&session.identity) {
            Some(cur) if Arc::ptr_eq(cur, session) => Arc::clone(cur),
            _ => return false,
        };
        inner.sessions.remove(&current.identity);
        current.cancel.cancel();
        let total = inner.sessions.len();
        push_event(&mut inner.events, &current, kind, detail, total);
        true
    }

    /// Consistent point-in-time copy of the live set, ordered by admission
    /// time. Exposes no transport handles.
    pub async fn snapshot(&self) -> Vec<SessionSnapshot> {
        let inner = self.inner.read().await;
        let mut out = Vec::with_capacity(inner.sessions.len());
        for session in inner.sessions.values() {
            let beat = *session.last_beat.read().await;
            out.push(SessionSnapshot {
                identity: session.identity.clone(),
                display_name: session.display_name.clone(),
                remote_addr: session.remote_addr.clone(),
                launch_session: session.launch_session.clone(),
                connected_at: session.connected_at,
                last_heartbeat_at: beat.wall,
            });
        }
        out.sort_by(|a, b| {
            a.connected_at.cmp(&b.connected_at).then_with(|| a.identity.cmp(&b.identity))
        });
        out
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    /// Last `n` event-log entries in chronological order.
    pub async fn recent_events(&self, n: usize) -> Vec<EventLogEntry> {
        self.inner.read().await.events.recent(n)
    }

    /// Live entries for the sweeper's scan, cloned out so the walk holds no
    /// registry lock.
    pub(crate) async fn entries(&self) -> Vec<Arc<ClientSession>> {
        self.inner.read().await.sessions.values().map(Arc::clone).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn push_event(
    events: &mut EventLog,
    session: &ClientSession,
    kind: EventKind,
    detail: String,
    total_connected: usize,
) {
    tracing::info!(
        identity = %session.identity,
        event = kind.as_str(),
        detail = %detail,
        total_connected,
        "connection event"
    );
    events.append(EventLogEntry {
        timestamp: Utc::now(),
        identity: session.identity.clone(),
        display_name: session.display_name.clone(),
        kind,
        detail,
        total_connected,
    });
}
