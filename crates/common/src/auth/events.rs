//! Session notifications
//!
//! The token manager owns a broadcast channel. Any part of the application
//! (a navigation layer, the CLI) can subscribe and react, typically by
//! returning to a sign-in screen on [`AuthEvent::SessionExpired`].

use tokio::sync::broadcast;

/// Capacity of the event channel. Slow subscribers that fall further
/// behind than this see `RecvError::Lagged`.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Credentials were stored after login, TOTP verification or
    /// registration.
    SignedIn,
    /// The access token was rotated.
    TokensRefreshed,
    /// The user logged out.
    SignedOut,
    /// The session could not be recovered; local credentials were cleared.
    SessionExpired { reason: String },
}

pub(crate) fn channel() -> broadcast::Sender<AuthEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
