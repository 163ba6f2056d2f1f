//! Realtime channel protocol
//!
//! JSON text frames over the `/api/ws` WebSocket, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::models::Notification;

/// Server → client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveMessage {
    /// Sent once after the connection is registered
    Ready { unread: i64 },
    Notification { notification: Notification },
    Pong,
}

/// Client → server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveCommand {
    Ping,
}
