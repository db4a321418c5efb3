// Session registry: creates sessions, spawns their coordinators and drops finished ones.

use crate::domain::{FieldTuning, GameKey, Session, Snapshot};
use crate::use_cases::coordinator::{CoordinatorOutputs, CoordinatorSettings, session_task};
use crate::use_cases::sync::SnapshotSequencer;
use crate::use_cases::{RoutedBytes, RoutedUpdate, SessionEvent, SessionStatus};
use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock, broadcast, mpsc, watch};
use tracing::{debug, info};

/// Shared configuration for spawning sessions.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Capacity for inbound connection events.
    pub event_channel_capacity: usize,
    /// Capacity for broadcast session updates.
    pub update_broadcast_capacity: usize,
    /// Tick loop settings for each coordinator.
    pub coordinator: CoordinatorSettings,
    /// Field geometry and scoring rules.
    pub tuning: FieldTuning,
}

/// Per-session channels.
#[derive(Clone)]
pub struct SessionHandle {
    /// Key clients use to target this session.
    pub game_key: GameKey,
    /// Sender for events into the session coordinator.
    pub events_tx: mpsc::Sender<SessionEvent>,
    /// Broadcast sender for raw session updates.
    pub updates_tx: broadcast::Sender<RoutedUpdate>,
    /// Broadcast sender for serialized session updates.
    pub bytes_tx: broadcast::Sender<RoutedBytes>,
    /// Watch sender holding the latest serialized snapshot.
    pub latest_bytes_tx: watch::Sender<Utf8Bytes>,
    /// Watch sender holding the latest snapshot.
    pub snapshot_tx: watch::Sender<Snapshot>,
    /// Watch sender for lifecycle changes used by cleanup.
    pub status_tx: watch::Sender<SessionStatus>,
    /// Stops the coordinator when the session is dropped.
    shutdown: Arc<Notify>,
}

impl SessionHandle {
    pub fn latest_snapshot(&self) -> Snapshot {
        self.snapshot_tx.borrow().clone()
    }
}

/// Thread-safe registry for active sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    settings: SessionSettings,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("game_key", &self.game_key)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a session under a fresh key and spawns its coordinator.
    pub async fn create_session(&self) -> SessionHandle {
        let mut sessions = self.sessions.write().await;

        // v4 keys do not collide in practice; retry anyway so a key is never shared.
        let game_key = loop {
            let candidate = uuid::Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                if let Some(key) = GameKey::parse(&candidate) {
                    break key;
                }
            }
        };

        let session = Session::new(game_key.clone(), self.settings.tuning);
        let initial = SnapshotSequencer::initial(&session);

        // Channel wiring for the session coordinator.
        let (events_tx, events_rx) =
            mpsc::channel::<SessionEvent>(self.settings.event_channel_capacity);
        let (updates_tx, _updates_rx) =
            broadcast::channel::<RoutedUpdate>(self.settings.update_broadcast_capacity);
        let (bytes_tx, _bytes_rx) =
            broadcast::channel::<RoutedBytes>(self.settings.update_broadcast_capacity);
        let (latest_bytes_tx, _latest_bytes_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (snapshot_tx, _snapshot_rx) = watch::channel::<Snapshot>(initial);
        let (status_tx, _status_rx) = watch::channel::<SessionStatus>(SessionStatus::created());
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(session_task(
            session,
            events_rx,
            CoordinatorOutputs {
                updates_tx: updates_tx.clone(),
                snapshot_tx: snapshot_tx.clone(),
                status_tx: status_tx.clone(),
            },
            self.settings.coordinator,
            shutdown.clone(),
        ));

        let handle = SessionHandle {
            game_key: game_key.clone(),
            events_tx,
            updates_tx,
            bytes_tx,
            latest_bytes_tx,
            snapshot_tx,
            status_tx,
            shutdown,
        };

        sessions.insert(game_key.to_string(), handle.clone());
        info!(game_key = %game_key, "session created");
        handle
    }

    pub async fn get_session(&self, game_key: &str) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(game_key.trim()).cloned()
    }

    /// Drops a session and stops its coordinator.
    pub async fn remove_session(&self, game_key: &str) -> bool {
        let removed = self.sessions.write().await.remove(game_key);
        match removed {
            Some(handle) => {
                handle.shutdown.notify_one();
                info!(game_key, "session removed");
                true
            }
            None => false,
        }
    }

    /// Removes the session once it is finished and nobody is connected.
    pub fn spawn_cleanup_watcher(
        self: Arc<Self>,
        game_key: GameKey,
        mut status_rx: watch::Receiver<SessionStatus>,
    ) {
        tokio::spawn(async move {
            loop {
                let status = *status_rx.borrow_and_update();
                if status.is_disposable() {
                    break;
                }
                if status_rx.changed().await.is_err() {
                    debug!(game_key = %game_key, "status channel closed; cleanup watcher exiting");
                    return;
                }
            }
            self.remove_session(game_key.as_str()).await;
        });
    }
}
