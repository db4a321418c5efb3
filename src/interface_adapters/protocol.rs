// Wire protocol DTOs and conversions for the session WebSocket.
// Both the server adapters and the bundled client speak these types.

use crate::domain::{
    BallState, PaddleState, PlayerSlot, ScoreState, SessionError, SessionPhase, Snapshot,
};
use crate::use_cases::{PeerCommand, Presence, SessionUpdate};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    // Slot assignment, sent once right after connecting.
    #[serde(rename = "playerId", rename_all = "camelCase")]
    AssignSlot {
        player_id: u8,
        reconnect_token: String,
    },
    #[serde(rename = "game_started")]
    GameStarted,
    #[serde(rename = "game_state")]
    GameState(GameStateDto),
    #[serde(rename = "update_players")]
    UpdatePlayers { players: PlayersDto },
    #[serde(rename = "error")]
    Error { reason: String, message: String },
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "start_game")]
    StartGame,
    #[serde(rename = "player_update")]
    PlayerUpdate {
        // Slot the sender claims to be; checked against the connection's slot.
        #[serde(rename = "playerId", default, skip_serializing_if = "Option::is_none")]
        player_id: Option<u8>,
        x: f32,
    },
}

impl ClientMessage {
    pub fn paddle(slot: PlayerSlot, x: f32) -> Self {
        ClientMessage::PlayerUpdate {
            player_id: Some(slot.number()),
            x,
        }
    }

    /// Decoded command. The claimed slot is checked against the sender by the coordinator.
    pub fn into_command(self) -> PeerCommand {
        match self {
            ClientMessage::StartGame => PeerCommand::StartRequest,
            ClientMessage::PlayerUpdate { player_id, x } => PeerCommand::PaddleInput {
                claimed: player_id,
                x,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseDto {
    Created,
    WaitingForPlayers,
    Ready,
    Running,
    Finished,
}

impl From<SessionPhase> for PhaseDto {
    fn from(phase: SessionPhase) -> Self {
        match phase {
            SessionPhase::Created => PhaseDto::Created,
            SessionPhase::WaitingForPlayers => PhaseDto::WaitingForPlayers,
            SessionPhase::Ready => PhaseDto::Ready,
            SessionPhase::Running => PhaseDto::Running,
            SessionPhase::Finished => PhaseDto::Finished,
        }
    }
}

impl From<PhaseDto> for SessionPhase {
    fn from(phase: PhaseDto) -> Self {
        match phase {
            PhaseDto::Created => SessionPhase::Created,
            PhaseDto::WaitingForPlayers => SessionPhase::WaitingForPlayers,
            PhaseDto::Ready => SessionPhase::Ready,
            PhaseDto::Running => SessionPhase::Running,
            PhaseDto::Finished => SessionPhase::Finished,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BallDto {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub radius: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaddleDto {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PaddleDto {
    fn into_paddle(self, owner: PlayerSlot) -> PaddleState {
        PaddleState {
            owner,
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

impl From<&PaddleState> for PaddleDto {
    fn from(paddle: &PaddleState) -> Self {
        Self {
            x: paddle.x,
            y: paddle.y,
            width: paddle.width,
            height: paddle.height,
        }
    }
}

/// Authoritative snapshot as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateDto {
    pub seq: u64,
    pub phase: PhaseDto,
    pub ball: BallDto,
    pub player1: PaddleDto,
    pub player2: PaddleDto,
    pub score_player1: u32,
    pub score_player2: u32,
}

impl From<&Snapshot> for GameStateDto {
    fn from(snapshot: &Snapshot) -> Self {
        let ball = &snapshot.ball;
        Self {
            seq: snapshot.seq,
            phase: snapshot.phase.into(),
            ball: BallDto {
                x: ball.x,
                y: ball.y,
                dx: ball.dx,
                dy: ball.dy,
                radius: ball.radius,
            },
            player1: PaddleDto::from(&snapshot.paddle_one),
            player2: PaddleDto::from(&snapshot.paddle_two),
            score_player1: snapshot.score.score_one,
            score_player2: snapshot.score.score_two,
        }
    }
}

impl From<GameStateDto> for Snapshot {
    fn from(dto: GameStateDto) -> Self {
        Self {
            seq: dto.seq,
            phase: dto.phase.into(),
            paddle_one: dto.player1.into_paddle(PlayerSlot::One),
            paddle_two: dto.player2.into_paddle(PlayerSlot::Two),
            ball: BallState {
                x: dto.ball.x,
                y: dto.ball.y,
                dx: dto.ball.dx,
                dy: dto.ball.dy,
                radius: dto.ball.radius,
            },
            score: ScoreState {
                score_one: dto.score_player1,
                score_two: dto.score_player2,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayersDto {
    pub player1: bool,
    pub player2: bool,
}

impl From<Presence> for PlayersDto {
    fn from(presence: Presence) -> Self {
        Self {
            player1: presence.one,
            player2: presence.two,
        }
    }
}

impl From<PlayersDto> for Presence {
    fn from(players: PlayersDto) -> Self {
        Self {
            one: players.player1,
            two: players.player2,
        }
    }
}

impl ServerMessage {
    pub fn assign_slot(slot: PlayerSlot, reconnect_token: String) -> Self {
        ServerMessage::AssignSlot {
            player_id: slot.number(),
            reconnect_token,
        }
    }

    pub fn error(error: &SessionError) -> Self {
        ServerMessage::Error {
            reason: error.reason().to_string(),
            message: error.to_string(),
        }
    }
}

impl From<&Snapshot> for ServerMessage {
    fn from(snapshot: &Snapshot) -> Self {
        ServerMessage::GameState(GameStateDto::from(snapshot))
    }
}

impl From<&SessionUpdate> for ServerMessage {
    fn from(update: &SessionUpdate) -> Self {
        match update {
            SessionUpdate::Started => ServerMessage::GameStarted,
            SessionUpdate::Snapshot(snapshot) => ServerMessage::from(snapshot),
            SessionUpdate::Presence(presence) => ServerMessage::UpdatePlayers {
                players: (*presence).into(),
            },
            SessionUpdate::Error(error) => ServerMessage::error(error),
        }
    }
}
