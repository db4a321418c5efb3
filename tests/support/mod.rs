// Shared primitives for one-time server bootstrapping across integration tests.
#![allow(dead_code)]

use pong_server::client::{GameConnection, GameServerClient};
use pong_server::domain::FieldTuning;
use pong_server::interface_adapters::protocol::ServerMessage;
use pong_server::use_cases::{CoordinatorSettings, SessionSettings};
use std::{
    // `Arc` shares data between threads; `OnceLock` writes a value only once.
    sync::{Arc, OnceLock},
    time::Duration,
};

// Global base URL used by all tests after the server publishes its bound address.
static SERVER_URL: OnceLock<String> = OnceLock::new();
// One-time guard that ensures the server bootstrap path runs only once.
static SERVER_READY: OnceLock<()> = OnceLock::new();

// A fast tick so a whole match plays out quickly.
fn test_settings() -> SessionSettings {
    SessionSettings {
        event_channel_capacity: 1024,
        update_broadcast_capacity: 1024,
        coordinator: CoordinatorSettings {
            tick_interval: Duration::from_millis(1),
            dt_units: 1.0,
            snapshot_every_ticks: 1,
        },
        tuning: FieldTuning::default(),
    }
}

// Ensure the test server is running and return the shared base URL.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_url = Arc::new(OnceLock::<String>::new());
        let published_url_thread = Arc::clone(&published_url);
        // Spawn an OS thread so the server outlives individual `#[tokio::test]` runtimes.
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                // Bind to an ephemeral port to avoid collisions with local services.
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_url_thread.set(format!("http://{}", addr));
                pong_server::run_with_settings(listener, test_settings())
                    .await
                    .expect("server failed");
            });
        });
        wait_for_server_url_and_readiness(published_url);
    });

    SERVER_URL
        .get()
        .expect("server url should be initialized")
        .as_str()
}

// Wait for URL publication and then wait for the server socket to accept TCP connections.
fn wait_for_server_url_and_readiness(published_url: Arc<OnceLock<String>>) {
    let base_url = loop {
        if let Some(url) = published_url.get() {
            break url.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };

    let _ = SERVER_URL.set(base_url.clone());

    let addr = base_url
        .strip_prefix("http://")
        .expect("base url should use http://");

    // Retry for a short period to avoid racing server bind/accept.
    for _ in 0..100 {
        if std::net::TcpStream::connect(addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    panic!("server did not become ready in time");
}

pub fn api() -> GameServerClient {
    GameServerClient::new(ensure_server(), Duration::from_secs(5)).expect("http client")
}

pub async fn new_game() -> String {
    api().create_game().await.expect("create game")
}

pub async fn connect(game_key: &str, token: Option<&str>) -> GameConnection {
    api().connect(game_key, token).await.expect("websocket connect")
}

// Next message matching `pred`, skipping everything else.
pub async fn recv_until<F>(conn: &mut GameConnection, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match conn.recv().await.expect("recv") {
                Some(msg) if pred(&msg) => return msg,
                Some(_) => continue,
                None => panic!("connection closed while waiting"),
            }
        }
    })
    .await
    .expect("expected message in time")
}

// First two frames of every join: slot assignment and the resync snapshot.
pub async fn expect_join(conn: &mut GameConnection) -> (u8, String) {
    let first = tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("assign in time")
        .expect("recv")
        .expect("open");
    let (player_id, reconnect_token) = match first {
        ServerMessage::AssignSlot {
            player_id,
            reconnect_token,
        } => (player_id, reconnect_token),
        other => panic!("expected playerId first, got {other:?}"),
    };

    let second = conn.recv().await.expect("recv").expect("open");
    assert!(
        matches!(second, ServerMessage::GameState(_)),
        "expected game_state after playerId, got {second:?}"
    );
    (player_id, reconnect_token)
}
