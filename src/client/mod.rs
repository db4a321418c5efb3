// Client side: reconciler, presentation collaborators and the server connection.

pub mod connection;
pub mod reconciler;
pub mod session;
pub mod ui;

pub use connection::{ClientError, GameConnection, GameServerClient};
pub use reconciler::{ClientReconciler, PaddleDirection, Reconciled, RenderedState};
pub use session::{ClientInput, ClientSession};
pub use ui::{Notice, Notifier, Renderer, TracingNotifier, TracingRenderer};
