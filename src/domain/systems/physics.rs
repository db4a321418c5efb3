use crate::domain::state::{BallState, PaddleState, PlayerSlot, SessionPhase, SessionState};
use crate::domain::tuning::FieldTuning;

/// Advances a RUNNING session by one simulation step.
///
/// Pure and deterministic: the same input always yields the same output. Any phase other than
/// RUNNING is returned unchanged, which makes ticks after FINISHED no-ops.
///
/// Order inside a step: side walls, then paddles, then scoring boundaries. Paddles come first so
/// a ball touching a paddle edge bounces instead of scoring.
pub fn tick(state: &SessionState, dt_units: f32, tuning: &FieldTuning) -> SessionState {
    let mut next = state.clone();
    if state.phase != SessionPhase::Running {
        return next;
    }

    let ball = &mut next.ball;
    let r = ball.radius;
    let mut nx = ball.x + ball.dx * dt_units;
    let mut ny = ball.y + ball.dy * dt_units;

    // Side walls: clamp to the wall and point away from it so the bounce cannot re-trigger.
    if nx > tuning.field_width - r {
        nx = tuning.field_width - r;
        ball.dx = -ball.dx.abs();
    } else if nx < r {
        nx = r;
        ball.dx = ball.dx.abs();
    }

    let mut bounced = false;
    if hits_top_paddle(ball, &state.paddle_one, nx, ny) {
        ny = state.paddle_one.y + state.paddle_one.height + r;
        ball.dy = ball.dy.abs();
        bounced = true;
    } else if hits_bottom_paddle(ball, &state.paddle_two, nx, ny) {
        ny = state.paddle_two.y - r;
        ball.dy = -ball.dy.abs();
        bounced = true;
    }

    ball.x = nx;
    ball.y = ny;

    if bounced {
        return next;
    }

    // Leaving through the bottom concedes for TWO, through the top concedes for ONE.
    let scorer = if ny > tuning.field_height - r {
        Some(PlayerSlot::One)
    } else if ny < r {
        Some(PlayerSlot::Two)
    } else {
        None
    };

    if let Some(scorer) = scorer {
        next.score.increment(scorer);
        // Re-serve from midfield: after ONE scores the ball heads down, after TWO it heads up.
        next.ball = BallState::serve(tuning, scorer == PlayerSlot::Two);
        if next.score.of(scorer) >= tuning.winning_score {
            next.phase = SessionPhase::Finished;
        }
    }

    next
}

// Ball moving up whose top edge enters the band of the top paddle this step.
fn hits_top_paddle(ball: &BallState, paddle: &PaddleState, nx: f32, ny: f32) -> bool {
    ball.dy < 0.0
        && ny - ball.radius <= paddle.y + paddle.height
        && ball.y - ball.radius >= paddle.y
        && paddle.spans(nx)
}

// Ball moving down whose bottom edge enters the band of the bottom paddle this step.
fn hits_bottom_paddle(ball: &BallState, paddle: &PaddleState, nx: f32, ny: f32) -> bool {
    ball.dy > 0.0
        && ny + ball.radius >= paddle.y
        && ball.y + ball.radius <= paddle.y + paddle.height
        && paddle.spans(nx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::GameKey;

    fn running_state(ball: BallState) -> SessionState {
        let tuning = FieldTuning::default();
        let mut state = SessionState::new(GameKey::parse("physics").unwrap(), &tuning);
        state.phase = SessionPhase::Running;
        state.ball = ball;
        state
    }

    fn ball(x: f32, y: f32, dx: f32, dy: f32) -> BallState {
        BallState {
            x,
            y,
            dx,
            dy,
            radius: 10.0,
        }
    }

    #[test]
    fn ball_moves_by_velocity_scaled_by_dt() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(400.0, 300.0, 2.0, -2.0));

        let next = tick(&state, 1.5, &tuning);

        assert_eq!((next.ball.x, next.ball.y), (403.0, 297.0));
        assert_eq!(next.score, state.score);
    }

    #[test]
    fn right_wall_reflects_dx_without_scoring() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(795.0, 300.0, 2.0, 2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.ball.dx, -2.0);
        assert_eq!(next.ball.x, 790.0);
        assert_eq!(next.score.max(), 0);
        assert_eq!(next.phase, SessionPhase::Running);
    }

    #[test]
    fn left_wall_reflects_dx() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(11.0, 300.0, -2.0, 2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.ball.dx, 2.0);
        assert_eq!(next.ball.x, 10.0);
    }

    #[test]
    fn bottom_paddle_reflects_dy() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(400.0, 559.0, 2.0, 2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.ball.dy, -2.0);
        assert_eq!(next.ball.y, 560.0);
        assert_eq!(next.score.max(), 0);
    }

    #[test]
    fn top_paddle_reflects_dy() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(400.0, 41.0, -2.0, -2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.ball.dy, 2.0);
        assert_eq!(next.ball.y, 40.0);
    }

    #[test]
    fn paddle_edge_contact_bounces_instead_of_scoring() {
        let tuning = FieldTuning::default();
        // Ball center lands exactly on the left edge of paddle TWO (x = 350).
        let state = running_state(ball(348.0, 559.0, 2.0, 2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.ball.dy, -2.0);
        assert_eq!(next.score.max(), 0);
    }

    #[test]
    fn missing_bottom_paddle_scores_for_one_and_reserves() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(700.0, 589.0, 2.0, 2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.score.score_one, 1);
        assert_eq!(next.score.score_two, 0);
        assert_eq!((next.ball.x, next.ball.y), (400.0, 300.0));
        assert_eq!(next.ball.dy, 2.0);
        assert_eq!(next.ball.dx, 2.0);
    }

    #[test]
    fn missing_top_paddle_scores_for_two() {
        let tuning = FieldTuning::default();
        let state = running_state(ball(700.0, 11.0, 2.0, -2.0));

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.score.score_two, 1);
        assert_eq!(next.score.score_one, 0);
        assert_eq!(next.ball.dy, -2.0);
    }

    #[test]
    fn fifth_point_finishes_the_session() {
        let tuning = FieldTuning::default();
        let mut state = running_state(ball(700.0, 589.0, 2.0, 2.0));
        state.score.score_one = 4;

        let next = tick(&state, 1.0, &tuning);

        assert_eq!(next.score.score_one, 5);
        assert_eq!(next.phase, SessionPhase::Finished);
    }

    #[test]
    fn tick_is_a_no_op_outside_running() {
        let tuning = FieldTuning::default();
        for phase in [
            SessionPhase::Created,
            SessionPhase::WaitingForPlayers,
            SessionPhase::Ready,
            SessionPhase::Finished,
        ] {
            let mut state = running_state(ball(700.0, 589.0, 2.0, 2.0));
            state.phase = phase;

            assert_eq!(tick(&state, 1.0, &tuning), state);
        }
    }

    #[test]
    fn tick_is_deterministic() {
        let tuning = FieldTuning::default();
        let mut state = running_state(ball(123.25, 456.5, 2.0, -2.0));
        state.paddle_one.x = 42.0;

        for _ in 0..500 {
            let a = tick(&state, 1.0, &tuning);
            let b = tick(&state, 1.0, &tuning);
            assert_eq!(a.ball.x.to_bits(), b.ball.x.to_bits());
            assert_eq!(a.ball.y.to_bits(), b.ball.y.to_bits());
            assert_eq!(a.ball.dx.to_bits(), b.ball.dx.to_bits());
            assert_eq!(a.ball.dy.to_bits(), b.ball.dy.to_bits());
            assert_eq!(a, b);
            state = a;
        }
    }

    #[test]
    fn a_single_tick_scores_at_most_once() {
        let tuning = FieldTuning::default();
        let mut state = running_state(ball(400.0, 300.0, 2.0, -2.0));

        for _ in 0..20_000 {
            if state.phase != SessionPhase::Running {
                break;
            }
            let next = tick(&state, 1.0, &tuning);
            let gained = (next.score.score_one - state.score.score_one)
                + (next.score.score_two - state.score.score_two);
            assert!(gained <= 1);
            state = next;
        }

        assert_eq!(state.phase, SessionPhase::Finished);
        assert_eq!(state.score.max(), tuning.winning_score);
    }
}
