// Client session: one task that owns the reconciler, so local input and snapshots never interleave.

use super::connection::{ClientError, GameConnection};
use super::reconciler::{ClientReconciler, PaddleDirection, Reconciled};
use super::ui::{Notice, Notifier, Renderer};
use crate::domain::FieldTuning;
use crate::interface_adapters::protocol::ClientMessage;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Local input fed into a running session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientInput {
    Move(PaddleDirection),
    MoveTo(f32),
    Start,
    Quit,
}

pub struct ClientSession<R, N> {
    connection: GameConnection,
    reconciler: ClientReconciler,
    renderer: R,
    notifier: N,
}

impl<R: Renderer, N: Notifier> ClientSession<R, N> {
    pub fn new(connection: GameConnection, tuning: FieldTuning, renderer: R, notifier: N) -> Self {
        Self {
            connection,
            reconciler: ClientReconciler::new(tuning),
            renderer,
            notifier,
        }
    }

    pub fn reconciler(&self) -> &ClientReconciler {
        &self.reconciler
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Applies a local input. Returns `false` when the session should stop.
    pub async fn handle_input(&mut self, input: ClientInput) -> Result<bool, ClientError> {
        let msg = match input {
            ClientInput::Move(direction) => self.reconciler.move_paddle(direction),
            ClientInput::MoveTo(x) => self.reconciler.move_paddle_to(x),
            ClientInput::Start => self.reconciler.start_request(),
            ClientInput::Quit => return Ok(false),
        };

        let Some(msg) = msg else {
            debug!(?input, "input not available yet");
            return Ok(true);
        };
        if matches!(msg, ClientMessage::PlayerUpdate { .. }) {
            // Optimistic move is visible before the server confirms it.
            self.renderer.render(self.reconciler.state());
        }
        self.connection.send(&msg).await?;
        Ok(true)
    }

    /// Waits for the next server message and reconciles it. `Ok(None)` once the server closed.
    pub async fn next_event(&mut self) -> Result<Option<Reconciled>, ClientError> {
        let Some(msg) = self.connection.recv().await? else {
            return Ok(None);
        };
        let outcome = self.reconciler.apply(msg);

        match &outcome {
            Reconciled::Applied { winner } => {
                self.renderer.render(self.reconciler.state());
                if let Some(winner) = winner {
                    self.notifier.notify(Notice::win(*winner));
                }
            }
            Reconciled::SlotAssigned(slot) => info!(slot = %slot, "slot assigned"),
            Reconciled::Started => info!("match started"),
            Reconciled::Rejected { reason, message } => {
                warn!(reason = %reason, message = %message, "request rejected by server");
            }
            Reconciled::Stale { seq } => debug!(seq, "stale snapshot dropped"),
            Reconciled::PlayersChanged(presence) => {
                debug!(player1 = presence.one, player2 = presence.two, "players changed");
            }
        }
        Ok(Some(outcome))
    }

    /// Runs until the server closes the socket or `Quit` arrives.
    pub async fn run(
        mut self,
        mut inputs: mpsc::Receiver<ClientInput>,
    ) -> Result<ClientReconciler, ClientError> {
        loop {
            tokio::select! {
                event = self.next_event() => {
                    if event?.is_none() {
                        break;
                    }
                }
                input = inputs.recv() => {
                    let keep_going = match input {
                        Some(input) => self.handle_input(input).await?,
                        None => false,
                    };
                    if !keep_going {
                        let _ = self.connection.close().await;
                        break;
                    }
                }
            }
        }
        Ok(self.reconciler)
    }

    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.connection.close().await
    }
}
