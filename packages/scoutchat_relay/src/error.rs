use thiserror::Error;

/// Errors surfaced by the relay library. Malformed client payloads are NOT
/// errors: they are dropped silently and counted in metrics.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The connection registry is full; the socket is closed without ever
    /// being registered.
    #[error("connection registry at capacity ({limit} connections)")]
    AtCapacity { limit: usize },
}
