//! Connection state of one node generation.

use std::fmt;

/// Bring-up progress. Only ever moves forward within one start; a restart begins again
/// from [`ConnectionState::NotStarted`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    #[default]
    NotStarted,
    /// Connected; the daemon has not yet left `WAITING_TO_START`.
    WaitingToStart,
    /// The wallet unlocker is available; the wallet is locked or uninitialised.
    Unlocking,
    /// The main RPC server is up and the watcher is running.
    ServerActive,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::NotStarted => "not_started",
            ConnectionState::WaitingToStart => "waiting_to_start",
            ConnectionState::Unlocking => "unlocking",
            ConnectionState::ServerActive => "server_active",
        }
    }

    /// Moves to `next` if it is further along. Returns whether the state changed.
    pub fn advance(&mut self, next: ConnectionState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let mut state = ConnectionState::default();
        assert!(state.advance(ConnectionState::WaitingToStart));
        assert!(state.advance(ConnectionState::ServerActive));
        assert!(!state.advance(ConnectionState::Unlocking));
        assert!(!state.advance(ConnectionState::ServerActive));
        assert_eq!(state, ConnectionState::ServerActive);
    }
}
