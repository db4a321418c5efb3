// Session Coordinator: one task per session that owns its state and drives the tick loop.

use super::sync::{self, InputBuffer, SnapshotSequencer};
use super::types::{
    Audience, JoinAccepted, PeerCommand, Presence, RoutedUpdate, SessionEvent, SessionStatus,
    SessionUpdate,
};
use crate::domain::{PlayerSlot, Session, SessionError, SessionPhase};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Settings shared by every coordinator.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorSettings {
    /// Fixed tick interval for the simulation loop.
    pub tick_interval: Duration,
    /// Simulation units advanced per tick.
    pub dt_units: f32,
    /// Broadcast a snapshot every N ticks while running.
    pub snapshot_every_ticks: u32,
}

/// Channels the coordinator publishes on.
pub struct CoordinatorOutputs {
    pub updates_tx: broadcast::Sender<RoutedUpdate>,
    pub snapshot_tx: watch::Sender<crate::domain::Snapshot>,
    pub status_tx: watch::Sender<SessionStatus>,
}

// A slot once assigned. It stays reserved for its token even while disconnected.
struct Seat {
    token: String,
    conn_id: Option<u64>,
    replaced: Arc<Notify>,
    // Set once this seat has been sent the FINISHED state.
    saw_result: bool,
}

struct Coordinator {
    session: Session,
    inputs: InputBuffer,
    sequencer: SnapshotSequencer,
    seats: [Option<Seat>; 2],
    outputs: CoordinatorOutputs,
    settings: CoordinatorSettings,
    ticks: u64,
}

pub async fn session_task(
    session: Session,
    mut events_rx: mpsc::Receiver<SessionEvent>,
    outputs: CoordinatorOutputs,
    settings: CoordinatorSettings,
    shutdown: Arc<Notify>,
) {
    let game_key = session.key().clone();
    let mut coordinator = Coordinator {
        session,
        inputs: InputBuffer::default(),
        sequencer: SnapshotSequencer::default(),
        seats: [None, None],
        outputs,
        settings,
        ticks: 0,
    };

    // The interval only gets polled while RUNNING; it is reset on start.
    let mut interval = tokio::time::interval(settings.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let running = coordinator.session.phase() == SessionPhase::Running;
        tokio::select! {
            _ = shutdown.notified() => {
                // Exit cleanly when the registry drops the session.
                break;
            }
            event = events_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                coordinator.handle_event(event);
                if !running && coordinator.session.phase() == SessionPhase::Running {
                    interval.reset();
                }
            }
            _ = interval.tick(), if running => {
                coordinator.tick();
            }
        }
    }

    info!(game_key = %game_key, "session coordinator stopped");
}

impl Coordinator {
    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join {
                conn_id,
                token,
                reply,
            } => self.handle_join(conn_id, token, reply),
            SessionEvent::Leave { slot, conn_id } => self.handle_leave(slot, conn_id),
            SessionEvent::Command {
                slot,
                conn_id,
                command,
            } => self.handle_command(slot, conn_id, command),
        }
    }

    fn handle_join(
        &mut self,
        conn_id: u64,
        token: Option<String>,
        reply: oneshot::Sender<Result<JoinAccepted, SessionError>>,
    ) {
        let reclaimed = token.as_deref().and_then(|token| self.slot_for_token(token));

        let (slot, reconnected) = match reclaimed {
            Some(slot) => (slot, true),
            None => match self.session.assign_slot() {
                Ok(slot) => {
                    self.seats[slot.index()] = Some(Seat {
                        token: uuid::Uuid::new_v4().to_string(),
                        conn_id: None,
                        replaced: Arc::new(Notify::new()),
                        saw_result: false,
                    });
                    (slot, false)
                }
                Err(e) => {
                    info!(game_key = %self.session.key(), conn_id, "join rejected: session full");
                    let _ = reply.send(Err(e));
                    return;
                }
            },
        };

        let Some(seat) = self.seats[slot.index()].as_mut() else {
            return;
        };
        if seat.conn_id.is_some() {
            // Tell the older connection to close; this one owns the slot now.
            seat.replaced.notify_one();
            seat.replaced = Arc::new(Notify::new());
        }
        seat.conn_id = Some(conn_id);
        // The join reply carries the latest snapshot, so a finished result reaches this seat.
        if self.session.phase() == SessionPhase::Finished {
            seat.saw_result = true;
        }
        let reconnect_token = seat.token.clone();
        let replaced = seat.replaced.clone();

        info!(
            game_key = %self.session.key(),
            slot = %slot,
            conn_id,
            reconnected,
            phase = %self.session.phase(),
            "player joined"
        );

        let snapshot = self.broadcast_snapshot();
        self.broadcast_presence();

        let accepted = JoinAccepted {
            slot,
            reconnect_token,
            snapshot,
            replaced,
            reconnected,
        };
        if reply.send(Ok(accepted)).is_err() {
            // The connection went away while waiting; free the seat's connection again.
            self.handle_leave(slot, conn_id);
        }
    }

    fn handle_leave(&mut self, slot: PlayerSlot, conn_id: u64) {
        let Some(seat) = self.seats[slot.index()].as_mut() else {
            return;
        };
        // A replaced connection leaving must not disconnect its successor.
        if seat.conn_id != Some(conn_id) {
            return;
        }
        seat.conn_id = None;
        info!(game_key = %self.session.key(), slot = %slot, conn_id, "player left");
        self.broadcast_presence();
    }

    fn handle_command(&mut self, slot: PlayerSlot, conn_id: u64, command: PeerCommand) {
        let owns_slot = self.seats[slot.index()]
            .as_ref()
            .is_some_and(|seat| seat.conn_id == Some(conn_id));
        if !owns_slot {
            debug!(slot = %slot, conn_id, "command from stale connection ignored");
            return;
        }

        let outcome = sync::dispatch(&mut self.session, &mut self.inputs, slot, command);

        if let Some(error) = outcome.error {
            debug!(slot = %slot, reason = error.reason(), "command rejected");
            self.send(Audience::Slot(slot), SessionUpdate::Error(error));
            return;
        }

        if outcome.started {
            info!(game_key = %self.session.key(), started_by = %slot, "match started");
            self.ticks = 0;
            self.send(Audience::All, SessionUpdate::Started);
        }
        if outcome.state_changed {
            self.broadcast_snapshot();
        }
        self.publish_status();
    }

    fn tick(&mut self) {
        let scorer = sync::run_tick(&mut self.session, &mut self.inputs, self.settings.dt_units);
        self.ticks += 1;

        let state = self.session.snapshot();
        if let Some(scorer) = scorer {
            info!(
                game_key = %self.session.key(),
                scorer = %scorer,
                score_one = state.score.score_one,
                score_two = state.score.score_two,
                "point scored"
            );
        }

        if self.session.phase() == SessionPhase::Finished {
            // Final snapshot carries the winning state; the loop stops ticking after this.
            self.broadcast_snapshot();
            for seat in self.seats.iter_mut().flatten() {
                if seat.conn_id.is_some() {
                    seat.saw_result = true;
                }
            }
            self.publish_status();
            info!(
                game_key = %self.session.key(),
                winner = ?self.session.winner().map(PlayerSlot::number),
                ticks = self.ticks,
                "match finished"
            );
            return;
        }

        let every = u64::from(self.settings.snapshot_every_ticks.max(1));
        if self.ticks % every == 0 {
            self.broadcast_snapshot();
        }
    }

    fn slot_for_token(&self, token: &str) -> Option<PlayerSlot> {
        PlayerSlot::ALL.into_iter().find(|slot| {
            self.seats[slot.index()]
                .as_ref()
                .is_some_and(|seat| seat.token == token)
        })
    }

    fn presence(&self) -> Presence {
        let connected = |slot: PlayerSlot| {
            self.seats[slot.index()]
                .as_ref()
                .is_some_and(|seat| seat.conn_id.is_some())
        };
        Presence {
            one: connected(PlayerSlot::One),
            two: connected(PlayerSlot::Two),
        }
    }

    fn send(&self, audience: Audience, update: SessionUpdate) {
        // No subscribers is fine: nobody is connected right now.
        let _ = self.outputs.updates_tx.send(RoutedUpdate { audience, update });
    }

    fn broadcast_snapshot(&mut self) -> crate::domain::Snapshot {
        let snapshot = self.sequencer.capture(&self.session);
        self.outputs.snapshot_tx.send_replace(snapshot.clone());
        self.send(Audience::All, SessionUpdate::Snapshot(snapshot.clone()));
        snapshot
    }

    fn broadcast_presence(&self) {
        self.send(Audience::All, SessionUpdate::Presence(self.presence()));
        self.publish_status();
    }

    fn publish_status(&self) {
        self.outputs.status_tx.send_replace(SessionStatus {
            phase: self.session.phase(),
            connected: self.presence().connected(),
            result_delivered: self
                .seats
                .iter()
                .all(|seat| seat.as_ref().is_some_and(|seat| seat.saw_result)),
        });
    }
}
