//! Integration tests running the daemon client against a scripted fake
//! daemon on a real Unix socket.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use tunnelkey_core::config::DaemonConfig;
use tunnelkey_core::daemon::{DaemonClient, DaemonEvent};
use tunnelkey_core::manager::{KeyManager, KeyService};
use tunnelkey_core::model::{KeyStatus, PublicKey, TunnelState};

fn test_key() -> PublicKey {
    PublicKey::from_bytes([42u8; 32])
}

fn daemon_config(socket_path: PathBuf) -> DaemonConfig {
    DaemonConfig {
        socket_path,
        connect_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(2),
    }
}

/// Bind a socket and run `script` against the first connection.
fn spawn_fake_daemon<F, Fut>(dir: &tempfile::TempDir, script: F) -> (PathBuf, JoinHandle<()>)
where
    F: FnOnce(UnixStream) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let socket_path = dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket_path).unwrap();
    let handle = tokio::spawn(async move {
        let (stream, _addr) = listener.accept().await.unwrap();
        script(stream).await;
    });
    (socket_path, handle)
}

async fn read_request(reader: &mut BufReader<tokio::net::unix::OwnedReadHalf>) -> Value {
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();
    serde_json::from_str(&line).unwrap()
}

async fn write_line(writer: &mut tokio::net::unix::OwnedWriteHalf, value: &Value) {
    let mut line = serde_json::to_string(value).unwrap();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.unwrap();
}

#[tokio::test]
async fn key_status_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (socket_path, daemon) = spawn_fake_daemon(&dir, |stream| async move {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        let request = read_request(&mut reader).await;
        assert_eq!(request["method"], "key_status");
        write_line(
            &mut write,
            &json!({
                "id": request["id"],
                "result": {
                    "status": "present",
                    "public_key": test_key().to_base64(),
                    "verified": true,
                },
            }),
        )
        .await;
    });

    let (client, _events) = DaemonClient::connect(&daemon_config(socket_path)).await.unwrap();
    let status = client.key_status().await.unwrap();
    assert_eq!(
        status,
        KeyStatus::Present {
            public_key: test_key(),
            verified: Some(true),
        }
    );
    daemon.await.unwrap();
}

#[tokio::test]
async fn out_of_order_responses_correlate_by_id() {
    let dir = tempfile::tempdir().unwrap();
    let (socket_path, daemon) = spawn_fake_daemon(&dir, |stream| async move {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        // Collect both requests before answering, then answer in reverse.
        let first = read_request(&mut reader).await;
        let second = read_request(&mut reader).await;

        for request in [&second, &first] {
            let result = match request["method"].as_str().unwrap() {
                "key_status" => json!({"status": "absent"}),
                "tunnel_state" => json!("blocked"),
                other => panic!("unexpected method {other}"),
            };
            write_line(&mut write, &json!({"id": request["id"], "result": result})).await;
        }
    });

    let (client, _events) = DaemonClient::connect(&daemon_config(socket_path)).await.unwrap();
    let (status, tunnel) = tokio::join!(client.key_status(), client.tunnel_state());
    assert_eq!(status.unwrap(), KeyStatus::Absent);
    assert_eq!(tunnel.unwrap(), TunnelState::Blocked);
    daemon.await.unwrap();
}

#[tokio::test]
async fn pushed_events_interleave_with_responses() {
    let dir = tempfile::tempdir().unwrap();
    let (socket_path, daemon) = spawn_fake_daemon(&dir, |stream| async move {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        let request = read_request(&mut reader).await;
        assert_eq!(request["method"], "generate_key");

        // Status push lands before the acknowledgement, as the daemon does
        // when the keygen finishes while the response is being written.
        write_line(
            &mut write,
            &json!({
                "event": {
                    "kind": "key_status",
                    "data": {
                        "status": "present",
                        "public_key": test_key().to_base64(),
                    },
                },
            }),
        )
        .await;
        write_line(&mut write, &json!({"id": request["id"], "result": null})).await;
    });

    let (client, mut events) = DaemonClient::connect(&daemon_config(socket_path)).await.unwrap();
    client.generate_key().await.unwrap();

    let event = events.recv().await.unwrap();
    assert_eq!(
        event,
        DaemonEvent::KeyStatus(KeyStatus::Present {
            public_key: test_key(),
            verified: None,
        })
    );
    daemon.await.unwrap();
}

#[tokio::test]
async fn daemon_disconnect_fails_pending_requests() {
    let dir = tempfile::tempdir().unwrap();
    let (socket_path, daemon) = spawn_fake_daemon(&dir, |stream| async move {
        let (read, _write) = stream.into_split();
        let mut reader = BufReader::new(read);
        // Read the request, then hang up without answering.
        let _request = read_request(&mut reader).await;
    });

    let (client, _events) = DaemonClient::connect(&daemon_config(socket_path)).await.unwrap();
    let err = client.key_status().await.unwrap_err();
    assert!(matches!(
        err,
        tunnelkey_core::CoreError::DaemonDisconnected
    ));
    daemon.await.unwrap();
}

#[tokio::test]
async fn manager_sees_statuses_pushed_after_generate() {
    let dir = tempfile::tempdir().unwrap();
    let (socket_path, daemon) = spawn_fake_daemon(&dir, |stream| async move {
        let (read, mut write) = stream.into_split();
        let mut reader = BufReader::new(read);

        let request = read_request(&mut reader).await;
        assert_eq!(request["method"], "generate_key");
        write_line(&mut write, &json!({"id": request["id"], "result": null})).await;
        write_line(
            &mut write,
            &json!({
                "event": {
                    "kind": "key_status",
                    "data": {
                        "status": "present",
                        "public_key": test_key().to_base64(),
                    },
                },
            }),
        )
        .await;
    });

    let (client, events) = DaemonClient::connect(&daemon_config(socket_path)).await.unwrap();
    let manager = KeyManager::new(Arc::new(client));
    manager.spawn_event_pump(events);

    let mut status_sub = manager.subscribe_status();
    let handle = manager.generate();
    handle.wait().await;

    let status = status_sub.recv().await.unwrap();
    assert_eq!(status.public_key(), Some(&test_key()));
    daemon.await.unwrap();
}
