// Synchronization rules: how peer commands mutate a session and what goes back out.

use super::types::PeerCommand;
use crate::domain::{
    InputOutcome, PlayerSlot, Session, SessionError, SessionPhase, Snapshot, StartOutcome,
};
use tracing::debug;

/// Paddle positions received while RUNNING, applied on the next tick.
///
/// Last writer wins per slot within one tick window.
#[derive(Debug, Default, Clone)]
pub struct InputBuffer {
    pending: [Option<f32>; 2],
}

impl InputBuffer {
    pub fn push(&mut self, slot: PlayerSlot, x: f32) {
        self.pending[slot.index()] = Some(x);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.iter().all(Option::is_none)
    }

    pub fn drain(&mut self) -> Vec<(PlayerSlot, f32)> {
        PlayerSlot::ALL
            .into_iter()
            .filter_map(|slot| self.pending[slot.index()].take().map(|x| (slot, x)))
            .collect()
    }
}

/// What a dispatched command did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dispatch {
    // Error for the sender only; the session is unchanged when set.
    pub error: Option<SessionError>,
    // READY → RUNNING happened.
    pub started: bool,
    // Visible state changed outside the tick loop and should be broadcast now.
    pub state_changed: bool,
}

impl Dispatch {
    fn rejected(error: SessionError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    fn changed() -> Self {
        Self {
            state_changed: true,
            ..Self::default()
        }
    }
}

/// Applies one peer command from `sender` to the session.
pub fn dispatch(
    session: &mut Session,
    inputs: &mut InputBuffer,
    sender: PlayerSlot,
    command: PeerCommand,
) -> Dispatch {
    match command {
        PeerCommand::StartRequest => match session.request_start(sender) {
            Ok(StartOutcome::Started) => Dispatch {
                started: true,
                state_changed: true,
                error: None,
            },
            Ok(StartOutcome::AlreadyRunning) => Dispatch::default(),
            Err(e) => Dispatch::rejected(e),
        },
        PeerCommand::PaddleInput { claimed, x } => {
            // Every mutating message after the end gets the same answer, whoever it claims to be.
            if session.phase() == SessionPhase::Finished {
                return Dispatch::rejected(SessionError::SessionFinished);
            }
            if claimed.is_some_and(|claimed| claimed != sender.number()) {
                debug!(sender = %sender, "paddle input for another slot ignored");
                return Dispatch::default();
            }

            // While running, inputs wait for the tick so physics sees one consistent position.
            if session.phase() == SessionPhase::Running {
                if x.is_finite() {
                    inputs.push(sender, x);
                }
                return Dispatch::default();
            }

            match session.apply_paddle_input(sender, x) {
                Ok(InputOutcome::Applied) => Dispatch::changed(),
                Ok(InputOutcome::Ignored) => Dispatch::default(),
                Err(e) => Dispatch::rejected(e),
            }
        }
    }
}

/// Applies buffered input and advances one tick. Returns the slot that scored, if any.
pub fn run_tick(
    session: &mut Session,
    inputs: &mut InputBuffer,
    dt_units: f32,
) -> Option<PlayerSlot> {
    for (slot, x) in inputs.drain() {
        // The phase was checked when the input was buffered.
        let _ = session.apply_paddle_input(slot, x);
    }
    session.advance(dt_units)
}

/// Hands out strictly increasing snapshot sequence numbers for one session.
#[derive(Debug, Default)]
pub struct SnapshotSequencer {
    last: u64,
}

impl SnapshotSequencer {
    /// Sequence 0 is reserved for the state published at creation.
    pub fn initial(session: &Session) -> Snapshot {
        Snapshot::capture(&session.snapshot(), 0)
    }

    pub fn capture(&mut self, session: &Session) -> Snapshot {
        self.last += 1;
        Snapshot::capture(&session.snapshot(), self.last)
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}
