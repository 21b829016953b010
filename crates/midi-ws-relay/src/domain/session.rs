//! Viewer session identity, lifecycle states, and outcome reports.

use std::fmt;

use uuid::Uuid;

/// Unique identifier of one viewer session, used in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex digits are plenty to tell sessions apart in logs.
        let simple = self.0.simple().to_string();
        f.write_str(&simple[..8])
    }
}

/// Lifecycle state of a viewer session.
///
/// ```text
/// Connecting ──► Active ──► Closing ──► Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Upgraded and subscribed; duties not started yet.
    Connecting,
    /// Both duties running: forwarding events and watching the peer.
    Active,
    /// One duty has fired the termination signal; the other is winding down.
    Closing,
    /// Both duties exited and the connection has been closed.
    Closed,
}

impl SessionState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Active)
                | (Self::Active, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

/// Error returned by [`SessionLifecycle::advance`] for an illegal transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

/// Tracks a session's current [`SessionState`] and enforces the legal order.
#[derive(Debug, Clone)]
pub struct SessionLifecycle {
    state: SessionState,
}

impl SessionLifecycle {
    /// Starts in [`SessionState::Connecting`].
    pub fn new() -> Self {
        Self {
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] and leaves the state unchanged if `next`
    /// does not follow the current state.
    pub fn advance(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if self.state.can_advance_to(next) {
            self.state = next;
            Ok(())
        } else {
            Err(InvalidTransition {
                from: self.state,
                to: next,
            })
        }
    }
}

impl Default for SessionLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The viewer sent a Close frame.
    PeerClosed,
    /// Reading from the viewer failed (reset, protocol error, ...).
    PeerError(String),
    /// The viewer's stream ended without a Close frame.
    StreamEnded,
    /// Sending an event to the viewer failed.
    WriteFailed(String),
    /// The event hub shut down.
    FeedClosed,
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => f.write_str("peer closed"),
            Self::PeerError(e) => write!(f, "peer error: {e}"),
            Self::StreamEnded => f.write_str("stream ended"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::FeedClosed => f.write_str("event feed closed"),
        }
    }
}

/// Summary returned when a session reaches [`SessionState::Closed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub id: SessionId,
    /// Events forwarded to the viewer.
    pub messages_sent: u64,
    /// Events dropped because the viewer fell behind its queue.
    pub messages_skipped: u64,
    pub end: SessionEnd,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_happy_path() {
        // Arrange
        let mut lifecycle = SessionLifecycle::new();

        // Act / Assert
        assert_eq!(lifecycle.state(), SessionState::Connecting);
        lifecycle.advance(SessionState::Active).unwrap();
        lifecycle.advance(SessionState::Closing).unwrap();
        lifecycle.advance(SessionState::Closed).unwrap();
        assert_eq!(lifecycle.state(), SessionState::Closed);
    }

    #[test]
    fn test_connecting_must_become_active_first() {
        let mut lifecycle = SessionLifecycle::new();

        let err = lifecycle.advance(SessionState::Closed).unwrap_err();

        assert_eq!(err.from, SessionState::Connecting);
        assert_eq!(lifecycle.state(), SessionState::Connecting);
    }

    #[test]
    fn test_active_cannot_skip_closing() {
        let mut lifecycle = SessionLifecycle::new();
        lifecycle.advance(SessionState::Active).unwrap();

        let err = lifecycle.advance(SessionState::Closed).unwrap_err();

        assert_eq!(err.from, SessionState::Active);
        assert_eq!(err.to, SessionState::Closed);
        assert_eq!(lifecycle.state(), SessionState::Active);
    }

    #[test]
    fn test_closed_is_terminal() {
        for next in [
            SessionState::Connecting,
            SessionState::Active,
            SessionState::Closing,
            SessionState::Closed,
        ] {
            assert!(!SessionState::Closed.can_advance_to(next));
        }
    }

    #[test]
    fn test_session_ids_are_unique_and_short() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 8);
    }

    #[test]
    fn test_session_end_display() {
        assert_eq!(SessionEnd::PeerClosed.to_string(), "peer closed");
        assert_eq!(
            SessionEnd::WriteFailed("broken pipe".into()).to_string(),
            "write failed: broken pipe"
        );
    }
}
