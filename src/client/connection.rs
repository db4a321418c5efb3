use crate::interface_adapters::net::sessions::CreateGameResponse;
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage};

use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use std::{fmt, time::Duration};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, protocol::Message},
};
use tracing::{debug, warn};

#[derive(Debug)]
pub enum ClientError {
    Http(reqwest::Error),
    // Non-success status from the HTTP API.
    Status(StatusCode),
    Ws(tungstenite::Error),
    Serialization(serde_json::Error),
    // The server closed the socket.
    Closed,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Http(e) => write!(f, "http request failed: {e}"),
            ClientError::Status(status) => write!(f, "unexpected http status {status}"),
            ClientError::Ws(e) => write!(f, "websocket error: {e}"),
            ClientError::Serialization(e) => write!(f, "invalid message: {e}"),
            ClientError::Closed => f.write_str("connection closed"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Http(e)
    }
}

impl From<tungstenite::Error> for ClientError {
    fn from(e: tungstenite::Error) -> Self {
        ClientError::Ws(e)
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e)
    }
}

// Thin reqwest client for the session HTTP API plus the socket entry point.
#[derive(Clone)]
pub struct GameServerClient {
    http: reqwest::Client,
    base_url: String,
}

impl GameServerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Creates a session and returns its game key.
    pub async fn create_game(&self) -> Result<String, ClientError> {
        let url = format!("{}/create_game", self.base_url);
        let response = self.http.post(url).send().await?;
        if response.status() != StatusCode::CREATED {
            return Err(ClientError::Status(response.status()));
        }
        let created = response.json::<CreateGameResponse>().await?;
        Ok(created.game_key)
    }

    /// Latest snapshot of a session.
    pub async fn game_state(&self, game_key: &str) -> Result<ServerMessage, ClientError> {
        let url = format!("{}/games/{game_key}", self.base_url);
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }
        Ok(response.json::<ServerMessage>().await?)
    }

    pub fn ws_url(&self, game_key: &str, token: Option<&str>) -> String {
        ws_url(&self.base_url, game_key, token)
    }

    pub async fn connect(
        &self,
        game_key: &str,
        token: Option<&str>,
    ) -> Result<GameConnection, ClientError> {
        GameConnection::connect(&self.ws_url(game_key, token)).await
    }
}

/// Socket URL for `game_key` on the server at `base_url`.
pub fn ws_url(base_url: &str, game_key: &str, token: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };

    match token {
        Some(token) => format!("{base}/ws/{game_key}?token={token}"),
        None => format!("{base}/ws/{game_key}"),
    }
}

/// One WebSocket connection to a session.
pub struct GameConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl GameConnection {
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let (stream, _response) = connect_async(url).await?;
        debug!(url, "connected");
        Ok(Self { stream })
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        let txt = serde_json::to_string(msg)?;
        self.send_text(txt).await
    }

    /// Sends a raw text frame, valid JSON or not.
    pub async fn send_text(&mut self, txt: impl Into<String>) -> Result<(), ClientError> {
        let txt: String = txt.into();
        self.stream.send(Message::Text(txt.into())).await?;
        Ok(())
    }

    /// Next server message. `Ok(None)` once the server has closed the socket.
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => match serde_json::from_str::<ServerMessage>(text.as_str()) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => {
                        warn!(error = %e, "unparsable server message skipped");
                    }
                },
                Message::Close(frame) => {
                    debug!(?frame, "server closed the connection");
                    return Ok(None);
                }
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
