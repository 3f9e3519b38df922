//! Client session library for the scout chat relay: a `ChatSession` over one
//! WebSocket, an append-only message log, and a self-clearing typing
//! indicator.

pub mod log;
pub mod session;
pub mod typing;

pub use log::MessageLog;
pub use session::{ChatSession, SessionError, SessionEvent};
pub use typing::TypingIndicator;
