use crate::use_cases::SessionRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Every live session, keyed by game key.
    pub session_registry: Arc<SessionRegistry>,
}
