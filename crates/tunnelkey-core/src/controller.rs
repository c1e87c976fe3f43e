// ── Key screen controller ──
//
// Reconciles the key screen's local state (key status, tunnel state, the
// in-flight operation) against the asynchronous pipeline owned by the
// KeyManager. All mutation happens through `handle_event`, driven by the
// owner's single event loop; background tasks only forward events into the
// channel returned by `activate` and never touch controller state.
//
// Race rules:
//   - Each issued operation captures the monotonic token current at issue
//     time. A completion whose token no longer matches is discarded.
//   - Tunnel-state changes replace the stored state immediately but the
//     render push is debounced: a burst collapses to the latest value.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::feed::Subscription;
use crate::manager::{KeyManager, OperationHandle};
use crate::model::{KeyStatus, OpKind, TunnelState};
use crate::render::{RenderState, derive_render};

/// Window within which a burst of tunnel-state changes collapses into a
/// single render push.
const RENDER_DEBOUNCE: Duration = Duration::from_millis(25);

/// Transient message shown when a verification ran but could not be
/// confirmed either way.
pub const VERIFICATION_FAILED_NOTICE: &str = "Key verification failed";

// ── Collaborator contracts ──────────────────────────────────────────

/// Consumes derived render descriptors.
pub trait RenderSink: Send + Sync {
    fn apply(&self, state: RenderState);
}

/// Shows one-shot, auto-dismissing user notices.
pub trait NotificationSink: Send + Sync {
    fn show_transient(&self, text: &str);
}

// ── Events ──────────────────────────────────────────────────────────

/// Everything that can reach the controller asynchronously. Applied via
/// [`KeyScreenController::handle_event`] on the owner's event loop.
#[derive(Debug, Clone)]
pub enum ScreenEvent {
    KeyStatus(KeyStatus),
    TunnelState(TunnelState),
    /// An issued operation finished (or was cancelled). `token` is the
    /// controller token captured when the operation was issued.
    OpCompleted { token: u64, kind: OpKind },
    /// A debounced render push came due.
    RenderDue { epoch: u64 },
}

// ── Subscription set ────────────────────────────────────────────────

/// The bridge tasks and their shared cancellation, created on activation
/// and consumed exactly once on deactivation.
struct ScreenSubscriptions {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ScreenSubscriptions {
    fn shutdown(self) {
        self.cancel.cancel();
        // Tasks drop their feed subscriptions as they unwind; the handles
        // are not awaited — nothing downstream observes them.
        drop(self.tasks);
    }
}

struct Active {
    events_tx: mpsc::UnboundedSender<ScreenEvent>,
    subscriptions: ScreenSubscriptions,
}

// ── Controller ──────────────────────────────────────────────────────

/// State machine behind the key management screen.
pub struct KeyScreenController {
    manager: KeyManager,
    render_sink: Arc<dyn RenderSink>,
    notifications: Arc<dyn NotificationSink>,

    key_status: KeyStatus,
    tunnel_state: TunnelState,
    in_flight: Option<OpKind>,

    /// Monotonic token of the most recently issued operation.
    op_token: u64,
    pending_op: Option<OperationHandle>,

    /// Epoch of the most recently scheduled render push.
    render_epoch: u64,
    debounce: Option<CancellationToken>,

    active: Option<Active>,
}

impl KeyScreenController {
    pub fn new(
        manager: KeyManager,
        render_sink: Arc<dyn RenderSink>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            manager,
            render_sink,
            notifications,
            key_status: KeyStatus::Absent,
            tunnel_state: TunnelState::Disconnected,
            in_flight: None,
            op_token: 0,
            pending_op: None,
            render_epoch: 0,
            debounce: None,
            active: None,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Subscribe to the manager's feeds and start forwarding into a fresh
    /// event channel. The caller owns the receiver and must route every
    /// event back through [`handle_event`](Self::handle_event).
    pub fn activate(&mut self) -> mpsc::UnboundedReceiver<ScreenEvent> {
        if self.active.is_some() {
            self.deactivate();
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let tasks = vec![
            spawn_forwarder(self.manager.subscribe_status(), {
                let tx = events_tx.clone();
                move |status| tx.send(ScreenEvent::KeyStatus(status))
            }, cancel.clone()),
            spawn_forwarder(self.manager.subscribe_tunnel(), {
                let tx = events_tx.clone();
                move |state| tx.send(ScreenEvent::TunnelState(state))
            }, cancel.clone()),
        ];

        // Seed from the manager's snapshots so the first render does not
        // wait for a push.
        self.key_status = self.manager.current_status();
        self.tunnel_state = self.manager.current_tunnel_state();

        self.active = Some(Active {
            events_tx,
            subscriptions: ScreenSubscriptions { cancel, tasks },
        });

        self.push_render();
        events_rx
    }

    /// Tear down subscriptions, cancel the pending operation and any
    /// scheduled render, and clear the operation flag. Idempotent, and
    /// safe to call before the first activation.
    pub fn deactivate(&mut self) {
        if let Some(active) = self.active.take() {
            active.subscriptions.shutdown();
        }
        if let Some(handle) = self.pending_op.take() {
            handle.cancel();
        }
        if let Some(scheduled) = self.debounce.take() {
            scheduled.cancel();
        }
        self.in_flight = None;
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    // ── Intents ──────────────────────────────────────────────────

    /// Generate a replacement key, superseding any in-flight operation.
    pub fn request_generate(&mut self) {
        self.request_operation(OpKind::Generate);
    }

    /// Verify the current key, superseding any in-flight operation.
    pub fn request_verify(&mut self) {
        self.request_operation(OpKind::Verify);
    }

    fn request_operation(&mut self, kind: OpKind) {
        let Some(events_tx) = self.active.as_ref().map(|a| a.events_tx.clone()) else {
            debug!(?kind, "ignoring request on inactive screen");
            return;
        };

        if let Some(previous) = self.pending_op.take() {
            previous.cancel();
        }

        self.op_token += 1;
        let token = self.op_token;
        self.in_flight = Some(kind);
        self.push_render();

        let handle = match kind {
            OpKind::Generate => self.manager.generate(),
            OpKind::Verify => self.manager.verify(),
        };

        let waiter = handle.clone();
        tokio::spawn(async move {
            waiter.wait().await;
            let _ = events_tx.send(ScreenEvent::OpCompleted { token, kind });
        });

        self.pending_op = Some(handle);
    }

    // ── Event application ────────────────────────────────────────

    /// Apply one event. Must be called from the single thread that owns
    /// this controller.
    pub fn handle_event(&mut self, event: ScreenEvent) {
        match event {
            ScreenEvent::KeyStatus(status) => {
                self.key_status = status;
                self.push_render();
            }
            ScreenEvent::TunnelState(state) => {
                self.tunnel_state = state;
                self.schedule_render();
            }
            ScreenEvent::OpCompleted { token, kind } => {
                if token != self.op_token {
                    debug!(token, current = self.op_token, "discarding stale completion");
                    return;
                }
                self.in_flight = None;
                self.pending_op = None;

                if kind == OpKind::Verify
                    && matches!(
                        self.manager.current_status(),
                        KeyStatus::Present { verified: None, .. }
                    )
                {
                    self.notifications.show_transient(VERIFICATION_FAILED_NOTICE);
                }

                self.push_render();
            }
            ScreenEvent::RenderDue { epoch } => {
                if epoch == self.render_epoch {
                    self.push_render();
                }
            }
        }
    }

    // ── Render derivation ────────────────────────────────────────

    /// Snapshot of the derived render state.
    pub fn render_state(&self) -> RenderState {
        derive_render(&self.key_status, self.tunnel_state, self.in_flight)
    }

    pub fn tunnel_state(&self) -> TunnelState {
        self.tunnel_state
    }

    fn push_render(&self) {
        self.render_sink.apply(self.render_state());
    }

    /// Schedule a debounced render push, superseding any pending one.
    fn schedule_render(&mut self) {
        let Some(events_tx) = self.active.as_ref().map(|a| a.events_tx.clone()) else {
            return;
        };

        if let Some(previous) = self.debounce.take() {
            previous.cancel();
        }

        self.render_epoch += 1;
        let epoch = self.render_epoch;
        let cancel = CancellationToken::new();
        self.debounce = Some(cancel.clone());

        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(RENDER_DEBOUNCE) => {
                    let _ = events_tx.send(ScreenEvent::RenderDue { epoch });
                }
            }
        });
    }
}

impl Drop for KeyScreenController {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Forward every value from a feed subscription until cancelled. The
/// subscription is dropped (and thereby unregistered) when the task exits.
fn spawn_forwarder<T, F>(
    mut subscription: Subscription<T>,
    forward: F,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    T: Send + 'static,
    F: Fn(T) -> Result<(), mpsc::error::SendError<ScreenEvent>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                value = subscription.recv() => {
                    let Some(value) = value else { break };
                    if forward(value).is_err() {
                        break;
                    }
                }
            }
        }
    })
}
