// ── Key manager ──
//
// Client-side owner of the daemon's key and tunnel state. Holds the latest
// snapshots, fans out changes through push feeds, and turns generate/verify
// requests into cancellable background operations.
//
// Operation outcomes are never returned through the handle: the daemon
// reports them by pushing a fresh KeyStatus, and the handle only signals
// that the request finished.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::daemon::DaemonEvent;
use crate::error::CoreError;
use crate::feed::{Feed, Subscription};
use crate::model::{KeyStatus, OpKind, TunnelState};

// ── KeyService ──────────────────────────────────────────────────────

/// Transport seam between the manager and the daemon.
///
/// `generate_key`/`verify_key` resolve when the daemon acknowledges that
/// the request ran to completion; the resulting status arrives separately
/// through the pushed event stream.
#[async_trait]
pub trait KeyService: Send + Sync {
    async fn generate_key(&self) -> Result<(), CoreError>;
    async fn verify_key(&self) -> Result<(), CoreError>;
    async fn key_status(&self) -> Result<KeyStatus, CoreError>;
    async fn tunnel_state(&self) -> Result<TunnelState, CoreError>;
}

// ── OperationHandle ─────────────────────────────────────────────────

/// Handle to one in-flight generate or verify request.
///
/// Cancellation is advisory: the daemon may still run the request to
/// completion, in which case its pushed status is applied normally; only
/// the local waiter stops caring.
#[derive(Clone)]
pub struct OperationHandle {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

impl OperationHandle {
    /// Stop waiting on this operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves when the request finishes or is cancelled, regardless of
    /// outcome.
    pub async fn wait(&self) {
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished).await;
    }
}

// ── KeyManager ──────────────────────────────────────────────────────

/// Cheaply cloneable handle to the shared manager state.
#[derive(Clone)]
pub struct KeyManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    service: Arc<dyn KeyService>,
    key_status: Mutex<KeyStatus>,
    tunnel_state: Mutex<TunnelState>,
    status_feed: Feed<KeyStatus>,
    tunnel_feed: Feed<TunnelState>,
    cancel: CancellationToken,
}

impl KeyManager {
    pub fn new(service: Arc<dyn KeyService>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                service,
                key_status: Mutex::new(KeyStatus::Absent),
                tunnel_state: Mutex::new(TunnelState::Disconnected),
                status_feed: Feed::new(),
                tunnel_feed: Feed::new(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    // ── Snapshots and subscriptions ──────────────────────────────

    pub fn current_status(&self) -> KeyStatus {
        self.inner
            .key_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn current_tunnel_state(&self) -> TunnelState {
        *self
            .inner
            .tunnel_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe_status(&self) -> Subscription<KeyStatus> {
        self.inner.status_feed.subscribe()
    }

    pub fn subscribe_tunnel(&self) -> Subscription<TunnelState> {
        self.inner.tunnel_feed.subscribe()
    }

    /// Live key-status subscriptions.
    pub fn status_subscriber_count(&self) -> usize {
        self.inner.status_feed.subscriber_count()
    }

    /// Live tunnel-state subscriptions.
    pub fn tunnel_subscriber_count(&self) -> usize {
        self.inner.tunnel_feed.subscriber_count()
    }

    /// Pull fresh snapshots from the daemon and publish both.
    ///
    /// Used once after connecting so subscribers have data before the
    /// first push arrives.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let (status, tunnel) = tokio::join!(
            self.inner.service.key_status(),
            self.inner.service.tunnel_state(),
        );
        self.inner.publish_status(status?);
        self.inner.publish_tunnel(tunnel?);
        Ok(())
    }

    // ── Operations ───────────────────────────────────────────────

    /// Ask the daemon to generate a replacement key.
    pub fn generate(&self) -> OperationHandle {
        self.spawn_operation(OpKind::Generate)
    }

    /// Ask the daemon to verify the current key against its backend.
    pub fn verify(&self) -> OperationHandle {
        self.spawn_operation(OpKind::Verify)
    }

    fn spawn_operation(&self, kind: OpKind) -> OperationHandle {
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);

        let inner = Arc::clone(&self.inner);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            let request = async {
                match kind {
                    OpKind::Generate => inner.service.generate_key().await,
                    OpKind::Verify => inner.service.verify_key().await,
                }
            };

            tokio::select! {
                biased;
                () = task_cancel.cancelled() => {
                    debug!(?kind, "stopped waiting on superseded operation");
                }
                result = request => {
                    if let Err(e) = result {
                        warn!(?kind, error = %e, "key operation request failed");
                        if kind == OpKind::Generate {
                            // The daemon never saw the request, so it cannot
                            // push the failure itself.
                            inner.publish_status(KeyStatus::GenerationFailed);
                        }
                    }
                }
            }

            let _ = done_tx.send(true);
        });

        OperationHandle {
            cancel,
            done: done_rx,
        }
    }

    // ── Event pump ───────────────────────────────────────────────

    /// Forward daemon push events into the feeds until the channel closes
    /// or the manager shuts down.
    pub fn spawn_event_pump(
        &self,
        mut events: mpsc::UnboundedReceiver<DaemonEvent>,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        match event {
                            DaemonEvent::KeyStatus(status) => inner.publish_status(status),
                            DaemonEvent::TunnelState(state) => inner.publish_tunnel(state),
                        }
                    }
                }
            }
            debug!("event pump shut down");
        })
    }

    /// Stop the event pump. Feeds stay readable; no further values arrive.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl ManagerInner {
    fn publish_status(&self, status: KeyStatus) {
        *self
            .key_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = status.clone();
        self.status_feed.publish(&status);
    }

    fn publish_tunnel(&self, state: TunnelState) {
        *self
            .tunnel_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
        self.tunnel_feed.publish(&state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{PUBLIC_KEY_LEN, PublicKey};
    use pretty_assertions::assert_eq;

    /// Service whose calls resolve (or hang) according to the test script.
    struct ScriptedService {
        generate: Mutex<Vec<Result<(), CoreError>>>,
        verify: Mutex<Vec<Result<(), CoreError>>>,
        hang: bool,
    }

    impl ScriptedService {
        fn ok() -> Self {
            Self {
                generate: Mutex::new(vec![Ok(())]),
                verify: Mutex::new(vec![Ok(())]),
                hang: false,
            }
        }

        fn hanging() -> Self {
            Self {
                generate: Mutex::new(Vec::new()),
                verify: Mutex::new(Vec::new()),
                hang: true,
            }
        }

        fn failing_generate() -> Self {
            Self {
                generate: Mutex::new(vec![Err(CoreError::DaemonDisconnected)]),
                verify: Mutex::new(Vec::new()),
                hang: false,
            }
        }

        fn failing_verify() -> Self {
            Self {
                generate: Mutex::new(Vec::new()),
                verify: Mutex::new(vec![Err(CoreError::DaemonDisconnected)]),
                hang: false,
            }
        }
    }

    #[async_trait]
    impl KeyService for ScriptedService {
        async fn generate_key(&self) -> Result<(), CoreError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.generate.lock().unwrap().pop().unwrap_or(Ok(()))
        }

        async fn verify_key(&self) -> Result<(), CoreError> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.verify.lock().unwrap().pop().unwrap_or(Ok(()))
        }

        async fn key_status(&self) -> Result<KeyStatus, CoreError> {
            Ok(KeyStatus::Present {
                public_key: PublicKey::from_bytes([1u8; PUBLIC_KEY_LEN]),
                verified: None,
            })
        }

        async fn tunnel_state(&self) -> Result<TunnelState, CoreError> {
            Ok(TunnelState::Connected)
        }
    }

    #[tokio::test]
    async fn refresh_publishes_both_snapshots() {
        let manager = KeyManager::new(Arc::new(ScriptedService::ok()));
        let mut status_sub = manager.subscribe_status();
        let mut tunnel_sub = manager.subscribe_tunnel();

        manager.refresh().await.unwrap();

        assert!(status_sub.recv().await.unwrap().is_present());
        assert_eq!(tunnel_sub.recv().await, Some(TunnelState::Connected));
        assert!(manager.current_status().is_present());
        assert_eq!(manager.current_tunnel_state(), TunnelState::Connected);
    }

    #[tokio::test]
    async fn generate_handle_resolves_on_completion() {
        let manager = KeyManager::new(Arc::new(ScriptedService::ok()));
        let handle = manager.generate();
        handle.wait().await;
    }

    #[tokio::test]
    async fn cancelled_operation_still_resolves() {
        let manager = KeyManager::new(Arc::new(ScriptedService::hanging()));
        let handle = manager.generate();
        handle.cancel();
        handle.wait().await;
    }

    #[tokio::test]
    async fn failed_generate_pushes_generation_failed() {
        let manager = KeyManager::new(Arc::new(ScriptedService::failing_generate()));
        let mut status_sub = manager.subscribe_status();

        let handle = manager.generate();
        handle.wait().await;

        assert_eq!(status_sub.recv().await, Some(KeyStatus::GenerationFailed));
        assert_eq!(manager.current_status(), KeyStatus::GenerationFailed);
    }

    #[tokio::test]
    async fn failed_verify_retains_last_known_status() {
        let manager = KeyManager::new(Arc::new(ScriptedService::failing_verify()));
        let handle = manager.verify();
        handle.wait().await;

        assert_eq!(manager.current_status(), KeyStatus::Absent);
        assert_eq!(manager.status_subscriber_count(), 0);
    }

    #[tokio::test]
    async fn event_pump_routes_both_event_kinds() {
        let manager = KeyManager::new(Arc::new(ScriptedService::ok()));
        let mut status_sub = manager.subscribe_status();
        let mut tunnel_sub = manager.subscribe_tunnel();

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = manager.spawn_event_pump(rx);

        tx.send(DaemonEvent::KeyStatus(KeyStatus::TooManyKeys)).unwrap();
        tx.send(DaemonEvent::TunnelState(TunnelState::Blocked)).unwrap();

        assert_eq!(status_sub.recv().await, Some(KeyStatus::TooManyKeys));
        assert_eq!(tunnel_sub.recv().await, Some(TunnelState::Blocked));

        drop(tx);
        pump.await.unwrap();
    }
}
