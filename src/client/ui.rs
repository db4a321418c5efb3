// Presentation collaborators for the client. Drawing and popups live behind these traits.

use super::reconciler::RenderedState;
use crate::domain::PlayerSlot;
use std::time::Duration;
use tracing::info;

/// Draws the rendered state; called once per reconciled frame.
pub trait Renderer {
    fn render(&mut self, state: &RenderedState);
}

/// Transient notification surface.
pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub visible_for: Duration,
    pub fade_out: Duration,
}

impl Notice {
    pub const WIN_VISIBLE: Duration = Duration::from_millis(3000);
    pub const WIN_FADE: Duration = Duration::from_millis(500);

    pub fn win(winner: PlayerSlot) -> Self {
        Self {
            message: format!("Player {winner} wins!"),
            visible_for: Self::WIN_VISIBLE,
            fade_out: Self::WIN_FADE,
        }
    }

    /// Time until the notice is fully dismissed.
    pub fn total(&self) -> Duration {
        self.visible_for + self.fade_out
    }
}

/// Renderer for headless runs: one debug line per frame.
#[derive(Debug, Default)]
pub struct TracingRenderer {
    frames: u64,
}

impl TracingRenderer {
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Renderer for TracingRenderer {
    fn render(&mut self, state: &RenderedState) {
        self.frames += 1;
        tracing::debug!(
            frame = self.frames,
            phase = %state.phase,
            ball_x = state.ball.x,
            ball_y = state.ball.y,
            paddle_one_x = state.paddle_one.x,
            paddle_two_x = state.paddle_two.x,
            score_one = state.score.score_one,
            score_two = state.score.score_two,
            "frame"
        );
    }
}

#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&mut self, notice: Notice) {
        info!(
            message = %notice.message,
            visible_ms = notice.total().as_millis(),
            "notice"
        );
    }
}
