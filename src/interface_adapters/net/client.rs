use crate::domain::{PlayerSlot, SessionError};
use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{ClientMessage, ServerMessage};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::ids::next_conn_id;
use crate::use_cases::{PeerCommand, RoutedBytes, SessionEvent, SessionHandle};

use axum::{
    Error,
    extract::{
        Path, Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    EventsClosed,
    UpdatesClosed,
    Rejected(SessionError),
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct ConnectQuery {
    // Reconnect token from a previous slot assignment.
    #[serde(default)]
    token: Option<String>,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_RECONNECT_TOKEN_LEN: usize = 128;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(game_key): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> impl IntoResponse {
    let Some(session) = state.session_registry.get_session(&game_key).await else {
        // Keep not-found responses consistent with the JSON error schema.
        return error_response(StatusCode::NOT_FOUND, "game not found");
    };

    let token = query
        .token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty() && token.len() <= MAX_RECONNECT_TOKEN_LEN);

    ws.on_upgrade(move |socket| handle_socket(socket, session, token))
}

async fn handle_socket(socket: WebSocket, session: SessionHandle, token: Option<String>) {
    // Separate connection id for correlating logs before/after a slot exists.
    let conn_id = next_conn_id();
    let span = info_span!(
        "conn",
        conn_id,
        game_key = %session.game_key,
        slot = tracing::field::Empty
    );
    serve_connection(socket, session, conn_id, token)
        .instrument(span)
        .await;
}

async fn serve_connection(
    mut socket: WebSocket,
    session: SessionHandle,
    conn_id: u64,
    token: Option<String>,
) {
    let mut ctx = match bootstrap_connection(&mut socket, &session, conn_id, token).await {
        Ok(ctx) => ctx,
        Err(NetError::Rejected(reason)) => {
            info!(reason = reason.reason(), "connection rejected");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ =
                send_close_with_reason(&mut socket, close_code::POLICY, "bootstrap failed").await;
            return;
        }
    };

    Span::current().record("slot", ctx.slot.number());
    info!(reconnected = ctx.reconnected, "client connected");

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<usize, NetError> {
    // Serialize message safely; log JSON errors instead of panicking
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

struct ConnCtx {
    pub conn_id: u64,
    pub slot: PlayerSlot,
    pub reconnected: bool,
    pub events_tx: mpsc::Sender<SessionEvent>,
    pub bytes_rx: broadcast::Receiver<RoutedBytes>,
    pub latest_bytes_rx: watch::Receiver<Utf8Bytes>,
    // Fired when a newer connection reclaims this slot.
    pub replaced: Arc<Notify>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    session: &SessionHandle,
    conn_id: u64,
    token: Option<String>,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* joining so nothing broadcast after the join is missed.
    let bytes_rx = session.bytes_tx.subscribe();
    let latest_bytes_rx = session.latest_bytes_tx.subscribe();

    let (reply_tx, reply_rx) = oneshot::channel();
    session
        .events_tx
        .send(SessionEvent::Join {
            conn_id,
            token,
            reply: reply_tx,
        })
        .await
        .map_err(|_| NetError::EventsClosed)?;
    let joined = reply_rx.await.map_err(|_| NetError::EventsClosed)?;

    let accepted = match joined {
        Ok(accepted) => accepted,
        Err(reason) => {
            let _ = send_message(socket, &ServerMessage::error(&reason)).await;
            let _ = send_close_with_reason(socket, close_code::POLICY, "session full").await;
            return Err(NetError::Rejected(reason));
        }
    };
    let slot = accepted.slot;

    // Slot assignment first, then the current state so a late joiner renders immediately.
    let assign = ServerMessage::assign_slot(slot, accepted.reconnect_token);
    let resync = ServerMessage::from(&accepted.snapshot);
    let mut bytes_out = 0;
    for msg in [&assign, &resync] {
        match send_message(socket, msg).await {
            Ok(bytes) => bytes_out += bytes as u64,
            Err(err) => {
                // Release the seat's connection if the handshake fails.
                let _ = session
                    .events_tx
                    .send(SessionEvent::Leave { slot, conn_id })
                    .await;
                return Err(err);
            }
        }
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        conn_id,
        slot,
        reconnected: accepted.reconnected,
        events_tx: session.events_tx.clone(),
        bytes_rx,
        latest_bytes_rx,
        replaced: accepted.replaced,
        lag_recovery_count: 0,

        msgs_in: 0,
        msgs_out: 2,
        bytes_in: 0,
        bytes_out,

        invalid_json: 0,

        last_input_full_log: now,
        last_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn process_command(ctx: &mut ConnCtx, command: PeerCommand) -> Result<LoopControl, NetError> {
    let is_start = matches!(command, PeerCommand::StartRequest);
    let event = SessionEvent::Command {
        slot: ctx.slot,
        conn_id: ctx.conn_id,
        command,
    };

    // Start requests must not be dropped under load; paddle input may be.
    if is_start {
        ctx.events_tx
            .send(event)
            .await
            .map_err(|_| NetError::EventsClosed)?;
        return Ok(LoopControl::Continue);
    }

    match ctx.events_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(&mut ctx.last_input_full_log) {
                warn!("session event channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::EventsClosed),
    }
}

async fn handle_incoming_ws(
    socket: &mut WebSocket,
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => process_command(ctx, msg.into_command()).await,
                    Err(parse_err) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        let reply = ServerMessage::error(&SessionError::MalformedMessage);
                        match send_message(socket, &reply).await {
                            Ok(bytes) => {
                                ctx.msgs_out += 1;
                                ctx.bytes_out += bytes as u64;
                                Ok(LoopControl::Continue)
                            }
                            Err(err) => {
                                warn!(error = ?err, "failed to send error reply");
                                Ok(LoopControl::Disconnect)
                            }
                        }
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_bytes(
    bytes: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = bytes.len();
    match socket.send(Message::Text(bytes)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send session update");
            LoopControl::Disconnect
        }
    }
}

async fn handle_outgoing(
    socket: &mut WebSocket,
    outgoing: Result<RoutedBytes, broadcast::error::RecvError>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    match outgoing {
        Ok(routed) => {
            if !routed.audience.includes(ctx.slot) {
                return Ok(LoopControl::Continue);
            }
            Ok(forward_bytes(routed.bytes, socket, &mut ctx.msgs_out, &mut ctx.bytes_out).await)
        }
        Err(broadcast::error::RecvError::Lagged(n)) => {
            if should_log(&mut ctx.last_lag_log) {
                warn!(missed = n, "session updates lagged; sending snapshot");
            }

            // Resync strategy: send the latest snapshot instead of everything missed.
            let latest = ctx.latest_bytes_rx.borrow().clone();
            if latest.is_empty() {
                return Ok(LoopControl::Continue);
            }
            ctx.lag_recovery_count += 1;
            Ok(forward_bytes(latest, socket, &mut ctx.msgs_out, &mut ctx.bytes_out).await)
        }
        Err(broadcast::error::RecvError::Closed) => Err(NetError::UpdatesClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;
    let replaced = ctx.replaced.clone();

    loop {
        let control = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => handle_incoming_ws(socket, incoming, ctx).await,

            // Outgoing session update
            outgoing = ctx.bytes_rx.recv() => handle_outgoing(socket, outgoing, ctx).await,

            // A newer connection reclaimed this slot with the reconnect token.
            _ = replaced.notified() => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "connection replaced".into(),
                });
                info!("connection replaced by newer session");
                Ok(LoopControl::Disconnect)
            }
        };

        let disconnect = match control {
            Ok(LoopControl::Continue) => false,
            Ok(LoopControl::Disconnect) => true,
            Err(e) => {
                fatal = Some(e);
                true
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    // The coordinator ignores this when a newer connection already owns the slot.
    ctx.events_tx
        .send(SessionEvent::Leave {
            slot: ctx.slot,
            conn_id: ctx.conn_id,
        })
        .await
        .map_err(|_| NetError::EventsClosed)?;

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!("client disconnected");
    Ok(())
}
