// Session data model shared by the server simulation and the client reconciler.

use super::tuning::FieldTuning;
use std::{fmt, sync::Arc};

/// Opaque identifier of one session and the routing key for every message on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameKey(Arc<str>);

impl GameKey {
    /// Returns `None` for blank keys.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(Arc::from(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed identity bound to a connecting peer for the lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    /// Assignment order: first come, first served.
    pub const ALL: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn number(self) -> u8 {
        match self {
            PlayerSlot::One => 1,
            PlayerSlot::Two => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(PlayerSlot::One),
            2 => Some(PlayerSlot::Two),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }
}

impl fmt::Display for PlayerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleState {
    pub owner: PlayerSlot,
    // Only `x` ever changes; the rest is fixed per slot.
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PaddleState {
    /// Centered paddle on its owner's row.
    pub fn home(owner: PlayerSlot, tuning: &FieldTuning) -> Self {
        Self {
            owner,
            x: tuning.centered_paddle_x(),
            y: tuning.paddle_y(owner),
            width: tuning.paddle_width,
            height: tuning.paddle_height,
        }
    }

    /// Inclusive horizontal span check.
    pub fn spans(&self, x: f32) -> bool {
        x >= self.x && x <= self.x + self.width
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub radius: f32,
}

impl BallState {
    /// Ball at midfield moving right, heading up (`toward_top`) or down.
    pub fn serve(tuning: &FieldTuning, toward_top: bool) -> Self {
        let (x, y) = tuning.center();
        let dy = if toward_top {
            -tuning.ball_speed
        } else {
            tuning.ball_speed
        };
        Self {
            x,
            y,
            dx: tuning.ball_speed,
            dy,
            radius: tuning.ball_radius,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreState {
    pub score_one: u32,
    pub score_two: u32,
}

impl ScoreState {
    pub fn of(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.score_one,
            PlayerSlot::Two => self.score_two,
        }
    }

    pub fn increment(&mut self, slot: PlayerSlot) {
        match slot {
            PlayerSlot::One => self.score_one += 1,
            PlayerSlot::Two => self.score_two += 1,
        }
    }

    pub fn max(&self) -> u32 {
        self.score_one.max(self.score_two)
    }

    /// Slot that has reached `winning_score`, if any.
    pub fn winner(&self, winning_score: u32) -> Option<PlayerSlot> {
        PlayerSlot::ALL
            .into_iter()
            .find(|slot| self.of(*slot) >= winning_score)
    }

    /// Slot whose score grew compared to `before`.
    pub fn gained_since(&self, before: &ScoreState) -> Option<PlayerSlot> {
        PlayerSlot::ALL
            .into_iter()
            .find(|slot| self.of(*slot) > before.of(*slot))
    }
}

/// Session lifecycle; transitions only move forward in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionPhase {
    Created,
    WaitingForPlayers,
    Ready,
    Running,
    Finished,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Created => "created",
            SessionPhase::WaitingForPlayers => "waiting_for_players",
            SessionPhase::Ready => "ready",
            SessionPhase::Running => "running",
            SessionPhase::Finished => "finished",
        }
    }

    /// Paddle input is only legal once both players are seated and before the match ends.
    pub fn accepts_input(self) -> bool {
        matches!(self, SessionPhase::Ready | SessionPhase::Running)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub key: GameKey,
    pub phase: SessionPhase,
    pub paddle_one: PaddleState,
    pub paddle_two: PaddleState,
    pub ball: BallState,
    pub score: ScoreState,
}

impl SessionState {
    pub fn new(key: GameKey, tuning: &FieldTuning) -> Self {
        Self {
            key,
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

    pub fn paddle_mut(&mut self, slot: PlayerSlot) -> &mut PaddleState {
        match slot {
            PlayerSlot::One => &mut self.paddle_one,
            PlayerSlot::Two => &mut self.paddle_two,
        }
    }
}

/// Authoritative copy of a session at one point of its broadcast sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub seq: u64,
    pub phase: SessionPhase,
    pub paddle_one: PaddleState,
    pub paddle_two: PaddleState,
    pub ball: BallState,
    pub score: ScoreState,
}

impl Snapshot {
    pub fn capture(state: &SessionState, seq: u64) -> Self {
        Self {
            seq,
            phase: state.phase,
            paddle_one: state.paddle_one,
            paddle_two: state.paddle_two,
            ball: state.ball,
            score: state.score,
        }
    }
}
