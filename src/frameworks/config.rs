use crate::domain::FieldTuning;
use crate::use_cases::{CoordinatorSettings, SessionSettings};
use std::{env, net::IpAddr, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_host() -> IpAddr {
    env::var("GAME_SERVER_HOST")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

pub fn http_port() -> u16 {
    env::var("GAME_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}

pub fn tick_interval() -> Duration {
    let millis = env::var("TICK_INTERVAL_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|millis| *millis > 0)
        .unwrap_or(DEFAULT_TICK_INTERVAL_MS);
    Duration::from_millis(millis)
}

pub fn snapshot_every_ticks() -> u32 {
    env::var("SNAPSHOT_EVERY_TICKS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|ticks| *ticks > 0)
        .unwrap_or(1)
}

pub const EVENT_CHANNEL_CAPACITY: usize = 1024;
pub const UPDATE_BROADCAST_CAPACITY: usize = 128;

// ~60 Hz.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 16;
// One tick advances the simulation by one velocity unit.
pub const DT_UNITS_PER_TICK: f32 = 1.0;

/// Session settings built from the environment.
pub fn session_settings() -> SessionSettings {
    SessionSettings {
        event_channel_capacity: EVENT_CHANNEL_CAPACITY,
        update_broadcast_capacity: UPDATE_BROADCAST_CAPACITY,
        coordinator: CoordinatorSettings {
            tick_interval: tick_interval(),
            dt_units: DT_UNITS_PER_TICK,
            snapshot_every_ticks: snapshot_every_ticks(),
        },
        tuning: FieldTuning::default(),
    }
}

// Client binary settings.

pub fn game_server_url() -> String {
    env::var("GAME_SERVER_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string())
}

/// Existing session to join; a new one is created when unset.
pub fn game_key() -> Option<String> {
    env::var("GAME_KEY").ok().filter(|key| !key.trim().is_empty())
}

pub fn reconnect_token() -> Option<String> {
    env::var("RECONNECT_TOKEN")
        .ok()
        .filter(|token| !token.trim().is_empty())
}

pub const CLIENT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
