//! Bridge between the key-screen controller and the TUI action loop.
//!
//! The controller's event channel and sink traits both terminate here:
//! events are re-dispatched as [`Action`]s so every mutation still happens
//! on the single action loop.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use tunnelkey_core::{NotificationSink, RenderSink, RenderState, ScreenEvent};

use crate::action::{Action, Notification};

/// Forward controller events into the action channel until either side
/// closes.
pub fn spawn_screen_bridge(
    mut events: mpsc::UnboundedReceiver<ScreenEvent>,
    action_tx: mpsc::UnboundedSender<Action>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if action_tx.send(Action::Screen(event)).is_err() {
                break;
            }
        }
        debug!("screen bridge shut down");
    })
}

/// Render target that re-dispatches descriptors through the action loop.
pub struct ActionRenderSink(pub mpsc::UnboundedSender<Action>);

impl RenderSink for ActionRenderSink {
    fn apply(&self, state: RenderState) {
        let _ = self.0.send(Action::KeyViewUpdated(state));
    }
}

/// Notification sink backed by the app's toast system.
pub struct ActionNotificationSink(pub mpsc::UnboundedSender<Action>);

impl NotificationSink for ActionNotificationSink {
    fn show_transient(&self, text: &str) {
        let _ = self.0.send(Action::Notify(Notification::warning(text)));
    }
}
