use super::state::PlayerSlot;

/// Gameplay tuning for the pong field.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldTuning {
    /// Field size in world units.
    pub field_width: f32,
    pub field_height: f32,

    /// Paddle size; identical for both slots.
    pub paddle_width: f32,
    pub paddle_height: f32,

    /// Gap between a paddle and the boundary it defends.
    pub paddle_inset: f32,

    pub ball_radius: f32,

    /// Starting magnitude of each ball velocity component, in units per tick.
    pub ball_speed: f32,

    /// Distance a paddle travels per key press on the client.
    pub paddle_step: f32,

    /// First score to reach this value wins the match.
    pub winning_score: u32,
}

impl Default for FieldTuning {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 600.0,
            paddle_width: 100.0,
            paddle_height: 20.0,
            paddle_inset: 10.0,
            ball_radius: 10.0,
            ball_speed: 2.0,
            paddle_step: 15.0,
            winning_score: 5,
        }
    }
}

impl FieldTuning {
    /// Largest legal paddle `x`.
    pub fn paddle_max_x(&self) -> f32 {
        (self.field_width - self.paddle_width).max(0.0)
    }

    pub fn clamp_paddle_x(&self, x: f32) -> f32 {
        x.clamp(0.0, self.paddle_max_x())
    }

    /// Paddle `x` that centers it horizontally.
    pub fn centered_paddle_x(&self) -> f32 {
        self.paddle_max_x() / 2.0
    }

    /// Fixed paddle row: slot ONE defends the top boundary, slot TWO the bottom one.
    pub fn paddle_y(&self, slot: PlayerSlot) -> f32 {
        match slot {
            PlayerSlot::One => self.paddle_inset,
            PlayerSlot::Two => self.field_height - self.paddle_inset - self.paddle_height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.field_width / 2.0, self.field_height / 2.0)
    }
}
