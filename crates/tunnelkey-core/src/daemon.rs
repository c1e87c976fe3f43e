// ── Daemon management-socket client ──
//
// Line-delimited JSON over the daemon's Unix socket. Requests carry a
// monotonically increasing correlation id; the daemon answers each request
// exactly once and may interleave pushed events (key status, tunnel state)
// between responses on the same stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DaemonConfig;
use crate::error::CoreError;
use crate::manager::KeyService;
use crate::model::{KeyStatus, TunnelState};

// ── Wire types ──────────────────────────────────────────────────────

/// RPC methods the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    GenerateKey,
    VerifyKey,
    KeyStatus,
    TunnelState,
}

#[derive(Debug, Serialize, Deserialize)]
struct Request {
    id: u64,
    method: Method,
}

/// One pushed event from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DaemonEvent {
    KeyStatus(KeyStatus),
    TunnelState(TunnelState),
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Any line the daemon may send.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Response(Response),
    Event { event: DaemonEvent },
}

type PendingMap = DashMap<u64, oneshot::Sender<Result<serde_json::Value, CoreError>>>;

// ── DaemonClient ────────────────────────────────────────────────────

/// Async client for the daemon management socket.
///
/// One socket, one background reader task. Concurrent requests are safe:
/// responses are routed back to callers by correlation id.
pub struct DaemonClient {
    writer: Mutex<OwnedWriteHalf>,
    pending: Arc<PendingMap>,
    next_id: AtomicU64,
    cancel: CancellationToken,
    request_timeout: std::time::Duration,
}

impl DaemonClient {
    /// Connect to the daemon socket and spawn the reader task.
    ///
    /// Returns the client plus the channel on which pushed [`DaemonEvent`]s
    /// arrive — typically handed straight to
    /// [`KeyManager::spawn_event_pump`](crate::manager::KeyManager::spawn_event_pump).
    pub async fn connect(
        config: &DaemonConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<DaemonEvent>), CoreError> {
        let stream = tokio::time::timeout(
            config.connect_timeout,
            UnixStream::connect(&config.socket_path),
        )
        .await
        .map_err(|_| CoreError::Timeout {
            timeout_secs: config.connect_timeout.as_secs(),
        })?
        .map_err(|e| CoreError::ConnectionFailed {
            path: config.socket_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let (read_half, write_half) = stream.into_split();
        let pending: Arc<PendingMap> = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(reader_task(
            read_half,
            Arc::clone(&pending),
            event_tx,
            cancel.clone(),
        ));

        debug!(path = %config.socket_path.display(), "connected to daemon");

        Ok((
            Self {
                writer: Mutex::new(write_half),
                pending,
                next_id: AtomicU64::new(1),
                cancel,
                request_timeout: config.request_timeout,
            },
            event_rx,
        ))
    }

    /// Send one request and await its response.
    async fn call(&self, method: Method) -> Result<serde_json::Value, CoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let line = serde_json::to_string(&Request { id, method })?;
        {
            let mut writer = self.writer.lock().await;
            let write = async {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            };
            if write.await.is_err() {
                self.pending.remove(&id);
                return Err(CoreError::DaemonDisconnected);
            }
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            // Reader task dropped the sender: socket is gone.
            Ok(Err(_)) => Err(CoreError::DaemonDisconnected),
            Err(_) => {
                self.pending.remove(&id);
                Err(CoreError::Timeout {
                    timeout_secs: self.request_timeout.as_secs(),
                })
            }
        }
    }

    /// Stop the reader task and fail any in-flight requests.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DaemonClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait::async_trait]
impl KeyService for DaemonClient {
    async fn generate_key(&self) -> Result<(), CoreError> {
        self.call(Method::GenerateKey).await.map(|_| ())
    }

    async fn verify_key(&self) -> Result<(), CoreError> {
        self.call(Method::VerifyKey).await.map(|_| ())
    }

    async fn key_status(&self) -> Result<KeyStatus, CoreError> {
        let value = self.call(Method::KeyStatus).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn tunnel_state(&self) -> Result<TunnelState, CoreError> {
        let value = self.call(Method::TunnelState).await?;
        Ok(serde_json::from_value(value)?)
    }
}

// ── Reader task ─────────────────────────────────────────────────────

/// Read daemon lines until EOF, error, or cancellation, routing responses
/// to their callers and events to the event channel.
async fn reader_task(
    read_half: OwnedReadHalf,
    pending: Arc<PendingMap>,
    events: mpsc::UnboundedSender<DaemonEvent>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(read_half).lines();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        dispatch_line(&line, &pending, &events);
                    }
                    Ok(None) => {
                        debug!("daemon closed the socket");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "daemon socket read failed");
                        break;
                    }
                }
            }
        }
    }

    // Fail everything still waiting so callers see the disconnect rather
    // than timing out.
    let waiting: Vec<u64> = pending.iter().map(|entry| *entry.key()).collect();
    for id in waiting {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(CoreError::DaemonDisconnected));
        }
    }
}

fn dispatch_line(
    line: &str,
    pending: &PendingMap,
    events: &mpsc::UnboundedSender<DaemonEvent>,
) {
    match serde_json::from_str::<Incoming>(line) {
        Ok(Incoming::Response(response)) => {
            let Some((_, tx)) = pending.remove(&response.id) else {
                debug!(id = response.id, "response for unknown request id");
                return;
            };
            let result = match response.error {
                Some(message) => Err(CoreError::Rejected { message }),
                None => Ok(response.result.unwrap_or(serde_json::Value::Null)),
            };
            let _ = tx.send(result);
        }
        Ok(Incoming::Event { event }) => {
            let _ = events.send(event);
        }
        Err(e) => {
            warn!(error = %e, "skipping malformed daemon line");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{PUBLIC_KEY_LEN, PublicKey};
    use pretty_assertions::assert_eq;

    #[test]
    fn request_wire_format() {
        let line = serde_json::to_string(&Request {
            id: 7,
            method: Method::GenerateKey,
        })
        .unwrap();
        assert_eq!(line, r#"{"id":7,"method":"generate_key"}"#);
    }

    #[test]
    fn response_line_parses_as_response() {
        let line = r#"{"id":3,"result":{"status":"absent"}}"#;
        match serde_json::from_str::<Incoming>(line).unwrap() {
            Incoming::Response(resp) => {
                assert_eq!(resp.id, 3);
                assert!(resp.error.is_none());
                let status: KeyStatus = serde_json::from_value(resp.result.unwrap()).unwrap();
                assert_eq!(status, KeyStatus::Absent);
            }
            Incoming::Event { .. } => panic!("parsed as event"),
        }
    }

    #[test]
    fn error_response_carries_message() {
        let line = r#"{"id":4,"error":"key generation in progress"}"#;
        match serde_json::from_str::<Incoming>(line).unwrap() {
            Incoming::Response(resp) => {
                assert_eq!(resp.error.as_deref(), Some("key generation in progress"));
            }
            Incoming::Event { .. } => panic!("parsed as event"),
        }
    }

    #[test]
    fn event_line_parses_as_event() {
        let key = PublicKey::from_bytes([5u8; PUBLIC_KEY_LEN]);
        let line = format!(
            r#"{{"event":{{"kind":"key_status","data":{{"status":"present","public_key":"{}"}}}}}}"#,
            key.to_base64()
        );
        match serde_json::from_str::<Incoming>(&line).unwrap() {
            Incoming::Event { event } => {
                assert_eq!(
                    event,
                    DaemonEvent::KeyStatus(KeyStatus::Present {
                        public_key: key,
                        verified: None,
                    })
                );
            }
            Incoming::Response(_) => panic!("parsed as response"),
        }
    }

    #[test]
    fn tunnel_event_round_trips() {
        let event = DaemonEvent::TunnelState(TunnelState::Blocked);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"kind":"tunnel_state","data":"blocked"}"#);
        let back: DaemonEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
