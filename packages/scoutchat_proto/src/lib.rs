//! Wire protocol for the scout chat relay.
//!
//! Three logical events travel over the WebSocket, JSON-encoded and tagged by
//! a `type` field:
//! - `sendMessage` (client → relay): a message submission
//! - `message` (relay → all clients): a broadcast message
//! - `typing` (client → relay → clients): a transient typing signal
//!
//! The relay and the client session both speak exactly this vocabulary; the
//! crate carries no transport or policy code.

use serde::{Deserialize, Serialize};

/// A broadcast chat message as delivered to every connected client.
///
/// `username` is a client-supplied display name with no uniqueness or
/// authenticity guarantee. `timestamp` is stamped by the relay at fan-out
/// time (RFC 3339, UTC) and is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub username: String,
    pub text: String,
    pub timestamp: String,
}

/// Events sent FROM a client TO the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Submit a message for broadcast. Both fields are untrusted free text;
    /// the relay drops the event silently if either is empty after trimming.
    SendMessage { username: String, text: String },
    /// The user is typing in the message field. Emitted per keystroke,
    /// no debounce.
    Typing { username: String },
}

/// Events sent FROM the relay TO clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A chat message, fanned out to every registered channel (sender
    /// included).
    Message(ChatMessage),
    /// Somebody is typing. Receivers arm a single shared indicator; there is
    /// no per-typist tracking.
    Typing { username: String },
}
