// Use cases layer: session coordination workflows for the pong server.

pub mod coordinator;
pub mod registry;
pub mod sync;
pub mod types;

pub use coordinator::CoordinatorSettings;
pub use registry::{SessionHandle, SessionRegistry, SessionSettings};
pub use types::{
    Audience, JoinAccepted, PeerCommand, Presence, RoutedBytes, RoutedUpdate, SessionEvent,
    SessionStatus, SessionUpdate,
};
