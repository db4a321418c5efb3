// Headless pong client: joins a session, starts it and keeps its paddle under the ball.

use pong_server::client::{
    ClientInput, ClientSession, GameServerClient, Reconciled, TracingNotifier, TracingRenderer,
};
use pong_server::domain::{FieldTuning, SessionPhase};
use pong_server::frameworks::{config, server::init_runtime};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_runtime();

    let api = GameServerClient::new(config::game_server_url(), config::CLIENT_HTTP_TIMEOUT)?;
    let game_key = match config::game_key() {
        Some(game_key) => game_key,
        None => {
            let game_key = api.create_game().await?;
            info!(game_key = %game_key, "created game");
            game_key
        }
    };

    let token = config::reconnect_token();
    let connection = api.connect(&game_key, token.as_deref()).await?;
    let mut session = ClientSession::new(
        connection,
        FieldTuning::default(),
        TracingRenderer::default(),
        TracingNotifier,
    );

    let mut start_sent = false;
    while let Some(event) = session.next_event().await? {
        if let Reconciled::SlotAssigned(slot) = event {
            info!(
                game_key = %game_key,
                slot = %slot,
                reconnect_token = session.reconciler().reconnect_token().unwrap_or_default(),
                "joined"
            );
        }

        let Some(slot) = session.reconciler().slot() else {
            continue;
        };
        let state = session.reconciler().state().clone();
        match state.phase {
            SessionPhase::Ready if !start_sent => {
                session.handle_input(ClientInput::Start).await?;
                start_sent = true;
            }
            SessionPhase::Running if matches!(event, Reconciled::Applied { .. }) => {
                let paddle = state.paddle(slot);
                let target = state.ball.x - paddle.width / 2.0;
                if (target - paddle.x).abs() > 1.0 {
                    session.handle_input(ClientInput::MoveTo(target)).await?;
                }
            }
            SessionPhase::Finished => break,
            _ => {}
        }
    }

    info!(frames = session.renderer().frames(), "session over");
    session.close().await?;
    Ok(())
}
