// Client Reconciler: the local rendered copy of a session.
//
// Authoritative snapshots always replace the whole rendered state. Local input only moves the
// own paddle optimistically until the next snapshot overwrites it.

use crate::domain::{
    BallState, FieldTuning, PaddleState, PlayerSlot, ScoreState, SessionPhase, Snapshot,
};
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage};
use crate::use_cases::Presence;

/// What the renderer draws.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedState {
    pub phase: SessionPhase,
    pub paddle_one: PaddleState,
    pub paddle_two: PaddleState,
    pub ball: BallState,
    pub score: ScoreState,
}

impl RenderedState {
    pub fn initial(tuning: &FieldTuning) -> Self {
        Self {
            phase: SessionPhase::Created,
            paddle_one: PaddleState::home(PlayerSlot::One, tuning),
            paddle_two: PaddleState::home(PlayerSlot::Two, tuning),
            ball: BallState::serve(tuning, true),
            score: ScoreState::default(),
        }
    }

    pub fn paddle(&self, slot: PlayerSlot) -> &PaddleState {
        match slot {
            PlayerSlot::One => &self.paddle_one,
            PlayerSlot::Two => &self.paddle_two,
        }
    }

    fn paddle_mut(&mut self, slot: PlayerSlot) -> &mut PaddleState {
        match slot {
            PlayerSlot::One => &mut self.paddle_one,
            PlayerSlot::Two => &mut self.paddle_two,
        }
    }
}

impl From<Snapshot> for RenderedState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            phase: snapshot.phase,
            paddle_one: snapshot.paddle_one,
            paddle_two: snapshot.paddle_two,
            ball: snapshot.ball,
            score: snapshot.score,
        }
    }
}

/// Arrow-key style paddle movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddleDirection {
    Left,
    Right,
}

/// Effect of one inbound server message on the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciled {
    SlotAssigned(PlayerSlot),
    Started,
    // `winner` is set once, on the first FINISHED snapshot.
    Applied { winner: Option<PlayerSlot> },
    // Sequence not newer than the last applied one; dropped.
    Stale { seq: u64 },
    PlayersChanged(Presence),
    Rejected { reason: String, message: String },
}

#[derive(Debug, Clone)]
pub struct ClientReconciler {
    tuning: FieldTuning,
    slot: Option<PlayerSlot>,
    reconnect_token: Option<String>,
    last_seq: Option<u64>,
    state: RenderedState,
    winner_announced: bool,
}

impl ClientReconciler {
    pub fn new(tuning: FieldTuning) -> Self {
        Self {
            state: RenderedState::initial(&tuning),
            tuning,
            slot: None,
            reconnect_token: None,
            last_seq: None,
            winner_announced: false,
        }
    }

    pub fn slot(&self) -> Option<PlayerSlot> {
        self.slot
    }

    pub fn reconnect_token(&self) -> Option<&str> {
        self.reconnect_token.as_deref()
    }

    pub fn state(&self) -> &RenderedState {
        &self.state
    }

    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    pub fn apply(&mut self, msg: ServerMessage) -> Reconciled {
        match msg {
            ServerMessage::AssignSlot {
                player_id,
                reconnect_token,
            } => match PlayerSlot::from_number(player_id) {
                Some(slot) => {
                    self.slot = Some(slot);
                    self.reconnect_token = Some(reconnect_token);
                    Reconciled::SlotAssigned(slot)
                }
                None => Reconciled::Rejected {
                    reason: "MalformedMessage".to_string(),
                    message: format!("unknown slot {player_id}"),
                },
            },
            ServerMessage::GameStarted => Reconciled::Started,
            ServerMessage::GameState(dto) => self.apply_snapshot(Snapshot::from(dto)),
            ServerMessage::UpdatePlayers { players } => Reconciled::PlayersChanged(players.into()),
            ServerMessage::Error { reason, message } => Reconciled::Rejected { reason, message },
        }
    }

    /// Replaces the whole rendered state unless `snapshot` is not newer than the last one.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> Reconciled {
        if self.last_seq.is_some_and(|last| snapshot.seq <= last) {
            return Reconciled::Stale { seq: snapshot.seq };
        }

        self.last_seq = Some(snapshot.seq);
        self.state = RenderedState::from(snapshot);

        let mut winner = None;
        if self.state.phase == SessionPhase::Finished && !self.winner_announced {
            self.winner_announced = true;
            winner = self.state.score.winner(self.tuning.winning_score);
        }
        Reconciled::Applied { winner }
    }

    /// Optimistic step of the own paddle. Returns the input to send, if any.
    pub fn move_paddle(&mut self, direction: PaddleDirection) -> Option<ClientMessage> {
        let slot = self.slot?;
        let step = match direction {
            PaddleDirection::Left => -self.tuning.paddle_step,
            PaddleDirection::Right => self.tuning.paddle_step,
        };
        let x = self.state.paddle(slot).x + step;
        self.move_paddle_to(x)
    }

    /// Optimistically places the own paddle at `x` (clamped).
    pub fn move_paddle_to(&mut self, x: f32) -> Option<ClientMessage> {
        let slot = self.slot?;
        if !self.state.phase.accepts_input() || !x.is_finite() {
            return None;
        }
        let x = self.tuning.clamp_paddle_x(x);
        self.state.paddle_mut(slot).x = x;
        Some(ClientMessage::paddle(slot, x))
    }

    /// Start is only offered once a slot has been assigned.
    pub fn start_request(&self) -> Option<ClientMessage> {
        self.slot.map(|_| ClientMessage::StartGame)
    }
}
