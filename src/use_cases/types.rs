// Use-case level inputs/outputs for the session coordinator.

use crate::domain::{PlayerSlot, SessionError, SessionPhase, Snapshot};
use axum::extract::ws::Utf8Bytes;
use std::sync::Arc;
use tokio::sync::{Notify, oneshot};

/// Peer request after it has been decoded from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCommand {
    StartRequest,
    // `claimed` is the raw slot number the message says it comes from, when it says so.
    PaddleInput {
        claimed: Option<u8>,
        x: f32,
    },
}

/// Events flowing from connections into a session coordinator.
#[derive(Debug)]
pub enum SessionEvent {
    Join {
        conn_id: u64,
        // Reconnect token handed out with a previous slot assignment.
        token: Option<String>,
        reply: oneshot::Sender<Result<JoinAccepted, SessionError>>,
    },
    Leave {
        slot: PlayerSlot,
        conn_id: u64,
    },
    Command {
        slot: PlayerSlot,
        conn_id: u64,
        command: PeerCommand,
    },
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinAccepted {
    pub slot: PlayerSlot,
    pub reconnect_token: String,
    // Latest state, sent right after the slot assignment.
    pub snapshot: Snapshot,
    // Fired when a newer connection takes over this slot.
    pub replaced: Arc<Notify>,
    pub reconnected: bool,
}

/// Who an outbound update is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    All,
    Slot(PlayerSlot),
}

impl Audience {
    pub fn includes(self, slot: PlayerSlot) -> bool {
        match self {
            Audience::All => true,
            Audience::Slot(target) => target == slot,
        }
    }
}

/// Which slots currently have a live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presence {
    pub one: bool,
    pub two: bool,
}

impl Presence {
    pub fn connected(&self) -> usize {
        usize::from(self.one) + usize::from(self.two)
    }
}

/// Outbound message produced by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Started,
    Snapshot(Snapshot),
    Presence(Presence),
    Error(SessionError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoutedUpdate {
    pub audience: Audience,
    pub update: SessionUpdate,
}

/// Serialized update shared by every connection of a session.
#[derive(Debug, Clone)]
pub struct RoutedBytes {
    pub audience: Audience,
    pub bytes: Utf8Bytes,
}

/// Coarse lifecycle view used to decide when a session can be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub connected: usize,
    // Both seats have received the final state, either live or on reconnect.
    pub result_delivered: bool,
}

impl SessionStatus {
    pub fn created() -> Self {
        Self {
            phase: SessionPhase::Created,
            connected: 0,
            result_delivered: false,
        }
    }

    /// A finished session is kept until every seat has seen the result and left.
    pub fn is_disposable(&self) -> bool {
        self.phase == SessionPhase::Finished && self.connected == 0 && self.result_delivered
    }
}
