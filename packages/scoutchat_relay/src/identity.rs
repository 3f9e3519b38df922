//! Identity resolution seam.
//!
//! Usernames on the wire are unauthenticated free text: any client may claim
//! any name. Broadcast logic never reads the claim directly; it goes through
//! this trait, so an authenticated provider can be swapped in without
//! touching the relay.

use crate::registry::ConnectionId;

/// Maps a client-claimed username to the display identity that gets
/// broadcast.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, claimed: &str, connection: ConnectionId) -> String;
}

/// Default policy: trust the claim as-is.
#[derive(Debug, Default)]
pub struct ClaimedNameIdentity;

impl IdentityProvider for ClaimedNameIdentity {
    fn resolve(&self, claimed: &str, _connection: ConnectionId) -> String {
        claimed.to_string()
    }
}
