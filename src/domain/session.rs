// Session State Store: the single owner of one session's authoritative state.
//
// The store is not shared; the session coordinator task owns it and serializes every mutation,
// which keeps a single `tick` in flight per session.

use super::errors::SessionError;
use super::state::{BallState, GameKey, PlayerSlot, SessionPhase, SessionState};
use super::systems::physics;
use super::tuning::FieldTuning;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    // READY → RUNNING happened now.
    Started,
    // Already running; repeated requests are no-ops.
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Applied,
    // Dropped without error (unassigned slot or non-finite position).
    Ignored,
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    tuning: FieldTuning,
    assigned: [bool; 2],
}

impl Session {
    pub fn new(key: GameKey, tuning: FieldTuning) -> Self {
        Self {
            state: SessionState::new(key, &tuning),
            tuning,
            assigned: [false; 2],
        }
    }

    pub fn key(&self) -> &GameKey {
        &self.state.key
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase
    }

    pub fn tuning(&self) -> &FieldTuning {
        &self.tuning
    }

    pub fn is_assigned(&self, slot: PlayerSlot) -> bool {
        self.assigned[slot.index()]
    }

    pub fn winner(&self) -> Option<PlayerSlot> {
        self.state.score.winner(self.tuning.winning_score)
    }

    /// Binds the next free slot. Slots are never handed out twice.
    pub fn assign_slot(&mut self) -> Result<PlayerSlot, SessionError> {
        let slot = PlayerSlot::ALL
            .into_iter()
            .find(|slot| !self.is_assigned(*slot))
            .ok_or(SessionError::SlotsExhausted)?;
        self.assigned[slot.index()] = true;

        self.state.phase = if self.assigned.iter().all(|taken| *taken) {
            SessionPhase::Ready
        } else {
            SessionPhase::WaitingForPlayers
        };
        Ok(slot)
    }

    /// Moves `slot`'s paddle to `x`, clamped to the field.
    pub fn apply_paddle_input(
        &mut self,
        slot: PlayerSlot,
        x: f32,
    ) -> Result<InputOutcome, SessionError> {
        match self.state.phase {
            SessionPhase::Finished => return Err(SessionError::SessionFinished),
            phase if !phase.accepts_input() => {
                return Err(SessionError::IllegalTransition { phase });
            }
            _ => {}
        }

        if !self.is_assigned(slot) || !x.is_finite() {
            return Ok(InputOutcome::Ignored);
        }

        let x = self.tuning.clamp_paddle_x(x);
        self.state.paddle_mut(slot).x = x;
        Ok(InputOutcome::Applied)
    }

    /// READY → RUNNING. The ball is served from midfield toward slot ONE.
    pub fn request_start(&mut self, slot: PlayerSlot) -> Result<StartOutcome, SessionError> {
        match self.state.phase {
            SessionPhase::Ready if self.is_assigned(slot) => {
                self.state.phase = SessionPhase::Running;
                self.state.ball = BallState::serve(&self.tuning, true);
                Ok(StartOutcome::Started)
            }
            SessionPhase::Running => Ok(StartOutcome::AlreadyRunning),
            SessionPhase::Finished => Err(SessionError::SessionFinished),
            phase => Err(SessionError::IllegalTransition { phase }),
        }
    }

    /// Runs one physics step. Returns the slot that scored during it, if any.
    pub fn advance(&mut self, dt_units: f32) -> Option<PlayerSlot> {
        if self.state.phase != SessionPhase::Running {
            return None;
        }
        let next = physics::tick(&self.state, dt_units, &self.tuning);
        let scorer = next.score.gained_since(&self.state.score);
        self.state = next;
        scorer
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }
}
