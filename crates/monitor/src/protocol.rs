// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat wire protocol.
//!
//! Three application-level frames ride the connection as JSON objects tagged
//! by `type`, independent of transport framing. Anything that does not parse
//! as one of them is not an error: it is handed to the application layer
//! untouched.

use serde::{Deserialize, Serialize};

/// A heartbeat-protocol frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client liveness signal, sent on a fixed cadence.
    Ping {
        /// Launch-handshake correlation id, echoed by the keepalive driver.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session: Option<String>,
    },
    /// Server acknowledgement of a valid `ping`.
    Pong { timestamp: String },
    /// One-time announcement sent immediately after admission.
    #[serde(rename_all = "camelCase")]
    Welcome { student_id: String, server_time: String },
}

/// Result of decoding one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A recognized heartbeat-protocol frame.
    Frame(Frame),
    /// Anything else, forwarded to the application handler unmodified.
    Passthrough(String),
}

/// Decode an inbound text payload.
pub fn decode(text: &str) -> Inbound {
    match serde_json::from_str::<Frame>(text) {
        Ok(frame) => Inbound::Frame(frame),
        Err(_) => Inbound::Passthrough(text.to_owned()),
    }
}

/// Encode a frame to its wire form.
pub fn encode(frame: &Frame) -> String {
    // Serialization of these enums cannot fail; an empty string would only
    // surface as a no-op send.
    serde_json::to_string(frame).unwrap_or_default()
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
