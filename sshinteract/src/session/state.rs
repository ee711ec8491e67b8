//! Session lifecycle states.

use std::fmt;

/// Lifecycle of an interaction session.
///
/// `Idle → Active → Draining → Closed`; a transport failure jumps straight
/// to `Closed`. No transition goes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Constructed, no channel subscribed yet.
    #[default]
    Idle,
    /// Both channels are delivering events.
    Active,
    /// One channel reached end-of-stream; the other is still running.
    Draining,
    /// Both channels ended, or the session failed. Terminal.
    Closed,
}

impl SessionState {
    /// State after the session starts consuming its channels.
    pub fn started(self) -> Option<SessionState> {
        match self {
            SessionState::Idle => Some(SessionState::Active),
            SessionState::Active | SessionState::Draining | SessionState::Closed => None,
        }
    }

    /// State after one channel reaches end-of-stream.
    pub fn channel_ended(self) -> SessionState {
        match self {
            SessionState::Idle | SessionState::Active => SessionState::Draining,
            SessionState::Draining | SessionState::Closed => SessionState::Closed,
        }
    }

    /// Whether the session is finished.
    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Active => "active",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        let state = SessionState::Idle.started().unwrap();
        assert_eq!(state, SessionState::Active);
        let state = state.channel_ended();
        assert_eq!(state, SessionState::Draining);
        let state = state.channel_ended();
        assert_eq!(state, SessionState::Closed);
        assert!(state.is_closed());
    }

    #[test]
    fn test_no_restart() {
        assert!(SessionState::Active.started().is_none());
        assert!(SessionState::Closed.started().is_none());
        assert_eq!(SessionState::Closed.channel_ended(), SessionState::Closed);
    }
}
