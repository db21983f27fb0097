//! Connection states and the transitions between them.
//!
//! ```text
//! Handshake --(intent Status)--> Status
//! Handshake --(intent Login)---> Login --(login success)--> Play
//! any state --(disconnect | I/O failure | timeout)--> Disconnected
//! ```
//!
//! [`StateMachine`] is owned by the task that reads the connection and is
//! the only thing that moves the state forward. Other tasks observe it
//! through a [`SharedState`], which is a snapshot and never a lock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use crate::error::{ProtocolError, Result};

/// The connection state that selects the active packet id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConnectionState {
    /// Handshaking state (initial connection).
    Handshake,
    /// Status state (server list ping).
    Status,
    /// Login state (authentication).
    Login,
    /// Play state (in-game).
    Play,
    /// Torn down; terminal.
    Disconnected,
}

impl ConnectionState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Handshake => 0,
            Self::Status => 1,
            Self::Login => 2,
            Self::Play => 3,
            Self::Disconnected => 4,
        }
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Handshake,
            1 => Self::Status,
            2 => Self::Login,
            3 => Self::Play,
            _ => Self::Disconnected,
        }
    }

    /// Whether the state machine allows moving from `self` to `to`.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Handshake, Self::Status | Self::Login)
                | (Self::Login, Self::Play)
                | (
                    Self::Handshake | Self::Status | Self::Login | Self::Play,
                    Self::Disconnected
                )
        )
    }

    /// Lower-case name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Status => "status",
            Self::Login => "login",
            Self::Play => "play",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side sends a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Client to server.
    Serverbound,
    /// Server to client.
    Clientbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serverbound => "serverbound",
            Self::Clientbound => "clientbound",
        })
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// The server sent a disconnect packet with this reason.
    Kicked(String),
    /// Reading or writing the stream failed.
    Io(String),
    /// No data arrived within the read timeout.
    Timeout,
    /// The framing broke and the stream cannot continue.
    Protocol(String),
    /// The stream ended cleanly.
    Closed,
    /// Torn down locally.
    Local,
}

impl fmt::Display for DisconnectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kicked(reason) => write!(f, "kicked: {reason}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Timeout => f.write_str("timed out"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
            Self::Closed => f.write_str("connection closed"),
            Self::Local => f.write_str("disconnected locally"),
        }
    }
}

/// Read-only view of the current state, shareable across tasks.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<AtomicU8>,
}

impl SharedState {
    fn new(state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(state.to_u8())),
        }
    }

    /// The most recently committed state.
    #[must_use]
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Whether the connection has been torn down.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.load() == ConnectionState::Disconnected
    }

    /// Mark the connection disconnected.
    ///
    /// Returns `true` only for the call that actually performed the change,
    /// so teardown work runs exactly once.
    pub fn mark_disconnected(&self) -> bool {
        let previous = self
            .inner
            .swap(ConnectionState::Disconnected.to_u8(), Ordering::AcqRel);
        previous != ConnectionState::Disconnected.to_u8()
    }

    fn store(&self, state: ConnectionState) {
        self.inner.store(state.to_u8(), Ordering::Release);
    }
}

/// The authoritative connection state.
#[derive(Debug)]
pub struct StateMachine {
    current: ConnectionState,
    shared: SharedState,
}

impl StateMachine {
    /// Start a connection in [`ConnectionState::Handshake`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ConnectionState::Handshake,
            shared: SharedState::new(ConnectionState::Handshake),
        }
    }

    /// The current state.
    ///
    /// A teardown from another task shows up here as
    /// [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn current(&self) -> ConnectionState {
        if self.shared.is_disconnected() {
            return ConnectionState::Disconnected;
        }
        self.current
    }

    /// A shareable snapshot handle.
    #[must_use]
    pub fn shared(&self) -> SharedState {
        self.shared.clone()
    }

    /// Commit a transition along one of the allowed edges.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidTransition`] for any other edge, which
    /// includes every transition out of [`ConnectionState::Disconnected`].
    pub fn transition(&mut self, to: ConnectionState) -> Result<()> {
        let from = self.current();
        if !from.can_transition_to(to) {
            return Err(ProtocolError::InvalidTransition { from, to });
        }

        if to == ConnectionState::Disconnected {
            self.shared.mark_disconnected();
        } else {
            self.shared.store(to);
        }
        self.current = to;

        debug!(%from, %to, "State transition");
        Ok(())
    }

    /// Force the terminal state from wherever the connection is.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn disconnect(&mut self) -> bool {
        self.current = ConnectionState::Disconnected;
        self.shared.mark_disconnected()
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ConnectionState; 5] = [
        ConnectionState::Handshake,
        ConnectionState::Status,
        ConnectionState::Login,
        ConnectionState::Play,
        ConnectionState::Disconnected,
    ];

    #[test]
    fn test_handshake_only_reaches_status_or_login() {
        for to in ALL {
            let mut machine = StateMachine::new();
            let allowed = matches!(
                to,
                ConnectionState::Status | ConnectionState::Login | ConnectionState::Disconnected
            );
            assert_eq!(machine.transition(to).is_ok(), allowed, "to {to}");
        }
    }

    #[test]
    fn test_login_to_play() {
        let mut machine = StateMachine::new();
        machine.transition(ConnectionState::Login).unwrap();
        assert!(machine.transition(ConnectionState::Status).is_err());
        machine.transition(ConnectionState::Play).unwrap();
        assert_eq!(machine.current(), ConnectionState::Play);
        assert_eq!(machine.shared().load(), ConnectionState::Play);
    }

    #[test]
    fn test_disconnect_from_every_state() {
        for from in [
            ConnectionState::Handshake,
            ConnectionState::Status,
            ConnectionState::Login,
            ConnectionState::Play,
        ] {
            assert!(from.can_transition_to(ConnectionState::Disconnected));
        }
    }

    #[test]
    fn test_nothing_leaves_disconnected() {
        let mut machine = StateMachine::new();
        machine.transition(ConnectionState::Disconnected).unwrap();
        for to in ALL {
            assert!(matches!(
                machine.transition(to),
                Err(ProtocolError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut machine = StateMachine::new();
        machine.transition(ConnectionState::Login).unwrap();
        let shared = machine.shared();

        assert!(shared.mark_disconnected());
        assert!(!shared.mark_disconnected());
        assert!(!machine.disconnect());

        // A teardown from another task is visible to the owner.
        assert_eq!(machine.current(), ConnectionState::Disconnected);
        assert!(machine.transition(ConnectionState::Play).is_err());
    }
}
