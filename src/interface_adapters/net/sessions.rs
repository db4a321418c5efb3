use crate::interface_adapters::http::error_response;
use crate::interface_adapters::net::serializer::spawn_session_serializer;
use crate::interface_adapters::protocol::ServerMessage;
use crate::interface_adapters::state::AppState;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct CreateGameResponse {
    // Key both players use to join the session.
    pub game_key: String,
}

pub async fn create_game_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session_registry.create_session().await;

    // Serializer first so the first connection cannot miss an update.
    spawn_session_serializer(&session);
    // Finished sessions are dropped once both players are gone.
    state
        .session_registry
        .clone()
        .spawn_cleanup_watcher(session.game_key.clone(), session.status_tx.subscribe());

    (
        StatusCode::CREATED,
        Json(CreateGameResponse {
            game_key: session.game_key.to_string(),
        }),
    )
}

pub async fn get_game_handler(
    State(state): State<Arc<AppState>>,
    Path(game_key): Path<String>,
) -> impl IntoResponse {
    match state.session_registry.get_session(&game_key).await {
        Some(session) => {
            let snapshot = session.latest_snapshot();
            Json(ServerMessage::from(&snapshot)).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "game not found"),
    }
}
