// tunnelkey-core: Daemon protocol client and key-screen logic for the TUI.

pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod feed;
pub mod manager;
pub mod model;
pub mod render;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Config, DaemonConfig};
pub use controller::{KeyScreenController, NotificationSink, RenderSink, ScreenEvent};
pub use daemon::{DaemonClient, DaemonEvent};
pub use error::CoreError;
pub use feed::{Feed, Subscription};
pub use manager::{KeyManager, KeyService, OperationHandle};
pub use render::{ActionButton, MessageKind, RenderState, Tone, derive_render};

// Re-export model types at the crate root for ergonomics.
pub use model::{KeyStatus, OpKind, PublicKey, TunnelState};
