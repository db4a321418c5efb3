// Network adapter modules split by the session socket, HTTP routes and the shared serializer.

pub mod client;
pub mod serializer;
pub mod sessions;

pub use client::ws_handler;
pub use serializer::spawn_session_serializer;
pub use sessions::{create_game_handler, get_game_handler};
