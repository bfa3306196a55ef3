//! Lifecycle phases of a persistent player connection.

use thiserror::Error;

/// Phases a connection moves through, from upgrade to release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// HTTP upgrade in progress.
    Connecting,
    /// Transport is up; waiting for the handshake message.
    AwaitingHandshake,
    /// User registered; relaying game state.
    Active,
    /// Tearing down: heartbeat stopped, memberships released.
    Closing,
    /// Terminal.
    Closed,
}

/// Events that move a session between phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport upgrade completed and guards are installed.
    Upgraded,
    /// The handshake registered the user.
    HandshakeAccepted,
    /// The handshake was malformed, mis-tagged or refused by the registry.
    HandshakeRejected,
    /// Read failure, idle timeout, remote close or exhausted relay budget.
    Disconnected,
    /// Cleanup finished.
    Released,
}

/// Returned when an event is not valid in the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session transition from {from:?} on {event:?}")]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub event: SessionEvent,
}

impl SessionPhase {
    /// Compute the phase reached by applying `event`.
    pub fn next(self, event: SessionEvent) -> Result<Self, InvalidTransition> {
        use SessionEvent as E;
        use SessionPhase as P;

        let next = match (self, event) {
            (P::Connecting, E::Upgraded) => P::AwaitingHandshake,
            (P::AwaitingHandshake, E::HandshakeAccepted) => P::Active,
            (P::AwaitingHandshake, E::HandshakeRejected) => P::Closing,
            (P::AwaitingHandshake | P::Active, E::Disconnected) => P::Closing,
            (P::Closing, E::Released) => P::Closed,
            (from, event) => return Err(InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// Whether the session reached its terminal phase.
    pub fn is_terminal(self) -> bool {
        self == Self::Closed
    }
}
