use crate::interface_adapters::protocol::ServerMessage;
use crate::use_cases::{RoutedBytes, RoutedUpdate, SessionHandle, SessionUpdate};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{broadcast, watch};
use tracing::{error, warn};

pub async fn session_update_serializer(
    mut updates_rx: broadcast::Receiver<RoutedUpdate>,
    bytes_tx: broadcast::Sender<RoutedBytes>,
    latest_bytes_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each update once and broadcast the shared bytes.
    loop {
        match updates_rx.recv().await {
            Ok(routed) => {
                let msg = ServerMessage::from(&routed.update);
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize session update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                if matches!(routed.update, SessionUpdate::Snapshot(_)) {
                    // Latest snapshot bytes back lag recovery.
                    latest_bytes_tx.send_replace(bytes.clone());
                }
                let _ = bytes_tx.send(RoutedBytes {
                    audience: routed.audience,
                    bytes,
                });
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    missed = n,
                    "session serializer lagged; skipping to latest update"
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                break;
            }
        }
    }
}

pub fn spawn_session_serializer(session: &SessionHandle) {
    tokio::spawn(session_update_serializer(
        session.updates_tx.subscribe(),
        session.bytes_tx.clone(),
        session.latest_bytes_tx.clone(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldTuning, GameKey, PlayerSlot, SessionError, SessionState, Snapshot};
    use crate::use_cases::Audience;

    #[tokio::test]
    async fn serializes_once_and_keeps_the_latest_snapshot() {
        let (updates_tx, updates_rx) = broadcast::channel(16);
        let (bytes_tx, mut bytes_rx) = broadcast::channel(16);
        let (latest_tx, latest_rx) = watch::channel(Utf8Bytes::from(""));
        let task = tokio::spawn(session_update_serializer(updates_rx, bytes_tx, latest_tx));

        let state = SessionState::new(GameKey::parse("ser").unwrap(), &FieldTuning::default());
        updates_tx
            .send(RoutedUpdate {
                audience: Audience::All,
                update: SessionUpdate::Snapshot(Snapshot::capture(&state, 7)),
            })
            .unwrap();
        updates_tx
            .send(RoutedUpdate {
                audience: Audience::Slot(PlayerSlot::Two),
                update: SessionUpdate::Error(SessionError::SessionFinished),
            })
            .unwrap();

        let first = bytes_rx.recv().await.unwrap();
        let second = bytes_rx.recv().await.unwrap();

        assert_eq!(first.audience, Audience::All);
        assert!(first.bytes.as_str().contains(r#""seq":7"#));
        assert_eq!(second.audience, Audience::Slot(PlayerSlot::Two));
        assert!(second.bytes.as_str().contains("SessionFinished"));
        // Errors never replace the latest snapshot.
        assert_eq!(latest_rx.borrow().as_str(), first.bytes.as_str());

        drop(updates_tx);
        task.await.unwrap();
    }
}
