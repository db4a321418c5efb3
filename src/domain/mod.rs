// Domain layer: session data model, field tuning and the rules of the game.

pub mod errors;
pub mod session;
pub mod state;
pub mod systems;
pub mod tuning;

pub use errors::SessionError;
pub use session::{InputOutcome, Session, StartOutcome};
pub use state::{
    BallState, GameKey, PaddleState, PlayerSlot, ScoreState, SessionPhase, SessionState, Snapshot,
};
pub use tuning::FieldTuning;
