use super::state::SessionPhase;
use std::fmt;

// Domain-level errors for session workflows.
//
// Spoofed paddle input and stale snapshots are not errors: both are dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    // Both slots are already bound to peers.
    SlotsExhausted,
    // The request is not legal in the session's current phase.
    IllegalTransition { phase: SessionPhase },
    // The match is over; no mutating request is accepted.
    SessionFinished,
    // The peer sent something that could not be decoded.
    MalformedMessage,
}

impl SessionError {
    /// Stable machine-readable reason used on the wire.
    pub fn reason(&self) -> &'static str {
        match self {
            SessionError::SlotsExhausted => "SlotsExhausted",
            SessionError::IllegalTransition { .. } => "IllegalTransition",
            SessionError::SessionFinished => "SessionFinished",
            SessionError::MalformedMessage => "MalformedMessage",
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SlotsExhausted => f.write_str("session already has two players"),
            SessionError::IllegalTransition { phase } => {
                write!(f, "request not allowed while session is {phase}")
            }
            SessionError::SessionFinished => f.write_str("session is finished"),
            SessionError::MalformedMessage => f.write_str("malformed message"),
        }
    }
}

impl std::error::Error for SessionError {}
