//! Tests for `BackendClient` and `ControlChannel` against a local axum
//! backend serving `/api/token`, `/api/status` and the `/api/commands`
//! WebSocket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Json;
use burrow_common::{CommandEnvelope, CommandKind, TunnelPhase, TunnelStatus};
use burrow_cli::application::ports::{CommandHandler, CredentialSource};
use burrow_cli::application::services::dispatch::CommandDispatcher;
use burrow_cli::domain::{CommandError, CredentialError};
use burrow_cli::infra::backend::BackendClient;
use burrow_cli::infra::control::{ChannelSettings, ControlChannel};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::helpers::{TEST_TIMEOUT, wait_until};

// ── Backend stand-in ─────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Backend {
    token: &'static str,
    /// Token requests from this index on answer 500.
    fail_from: Option<usize>,
    token_calls: Arc<AtomicUsize>,
    /// Text frames sent on every new command-stream connection.
    frames: Arc<Vec<String>>,
    close_after_frames: bool,
    connections: Arc<AtomicUsize>,
    statuses: Arc<Mutex<Vec<Value>>>,
}

async fn token(State(b): State<Backend>) -> Response {
    let n = b.token_calls.fetch_add(1, Ordering::SeqCst);
    if b.fail_from.is_some_and(|from| n >= from) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "token service down").into_response();
    }
    Json(json!({ "token": b.token, "expiresAt": "2030-01-01T00:00:00Z" })).into_response()
}

async fn status(State(b): State<Backend>, Json(body): Json<Value>) -> StatusCode {
    b.statuses.lock().push(body);
    StatusCode::NO_CONTENT
}

async fn commands(ws: WebSocketUpgrade, State(b): State<Backend>) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        b.connections.fetch_add(1, Ordering::SeqCst);
        for frame in b.frames.iter() {
            if socket.send(Message::Text(frame.clone().into())).await.is_err() {
                return;
            }
        }
        if b.close_after_frames {
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

async fn serve(backend: Backend) -> SocketAddr {
    let app = Router::new()
        .route("/api/token", get(token))
        .route("/api/status", post(status))
        .route("/api/commands", get(commands))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn client(addr: SocketAddr) -> BackendClient {
    BackendClient::new(&format!("http://{addr}/")).expect("client")
}

fn fast_settings() -> ChannelSettings {
    ChannelSettings {
        reconnect_delay: Duration::from_millis(100),
        dial_timeout: Duration::from_secs(2),
        stop_timeout: Duration::from_secs(2),
        ..ChannelSettings::default()
    }
}

// ── Command recording ────────────────────────────────────────────────────────

/// Forwards each handled command kind, optionally slowly.
struct Recorder {
    tx: mpsc::UnboundedSender<CommandEnvelope>,
    delay: Duration,
}

#[async_trait]
impl CommandHandler for Recorder {
    async fn handle(&self, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        tokio::time::sleep(self.delay).await;
        let _ = self.tx.send(envelope.clone());
        Ok(())
    }
}

fn recording_dispatcher(
    delay: Duration,
) -> (CommandDispatcher, mpsc::UnboundedReceiver<CommandEnvelope>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let recorder = Arc::new(Recorder { tx, delay });
    let mut dispatcher = CommandDispatcher::new();
    for kind in CommandKind::ALL {
        dispatcher.register(kind, recorder.clone());
    }
    (dispatcher, rx)
}

async fn next_command(rx: &mut mpsc::UnboundedReceiver<CommandEnvelope>) -> CommandEnvelope {
    tokio::time::timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("command within timeout")
        .expect("dispatcher alive")
}

// ── BackendClient ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_credential_decodes_token_and_expiry() {
    let addr = serve(Backend {
        token: "eyJhIjoiYmFja2VuZCJ9",
        ..Backend::default()
    })
    .await;

    let credential = client(addr).fetch_credential().await.expect("credential");

    assert_eq!(credential.token(), "eyJhIjoiYmFja2VuZCJ9");
    assert_eq!(
        credential.expires_at().map(|t| t.to_rfc3339()),
        Some("2030-01-01T00:00:00+00:00".to_string())
    );
}

#[tokio::test]
async fn test_fetch_credential_reports_status_and_body() {
    let addr = serve(Backend {
        token: "unused",
        fail_from: Some(0),
        ..Backend::default()
    })
    .await;

    let err = client(addr).fetch_credential().await.unwrap_err();

    match err {
        CredentialError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "token service down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_token_is_rejected() {
    let addr = serve(Backend {
        token: "  ",
        ..Backend::default()
    })
    .await;

    let err = client(addr).fetch_credential().await.unwrap_err();
    assert!(matches!(err, CredentialError::EmptyToken), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_backend_is_transport_error() {
    let client = BackendClient::new("http://127.0.0.1:9").expect("client");
    let err = client.fetch_credential().await.unwrap_err();
    assert!(matches!(err, CredentialError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_post_status_sends_backend_field_names() {
    let backend = Backend::default();
    let statuses = backend.statuses.clone();
    let addr = serve(backend).await;

    client(addr)
        .post_status(&TunnelStatus {
            running: true,
            phase: TunnelPhase::Running,
            tunnel_name: "my-tunnel".into(),
            pid: Some(7),
            ..TunnelStatus::default()
        })
        .await
        .expect("post");

    let posted = statuses.lock().clone();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0]["tunnelName"], "my-tunnel");
    assert_eq!(posted[0]["running"], true);
}

// ── ControlChannel ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_failed_fetch_keeps_previous_credential() {
    let addr = serve(Backend {
        token: "first-token",
        fail_from: Some(1),
        ..Backend::default()
    })
    .await;
    let channel = ControlChannel::new(client(addr), CommandDispatcher::new(), fast_settings());
    assert!(channel.latest_credential().is_none());

    channel.fetch_credential().await.expect("first fetch");
    let err = channel.fetch_credential().await.unwrap_err();

    assert!(matches!(err, CredentialError::Status { status: 500, .. }));
    let latest = channel.latest_credential().expect("kept");
    assert_eq!(latest.token(), "first-token");
}

#[tokio::test]
async fn test_commands_are_dispatched_in_order_and_malformed_skipped() {
    let addr = serve(Backend {
        frames: Arc::new(vec![
            "not json at all".to_string(),
            r#"{"type":"restart","payload":{}}"#.to_string(),
            r#"{"type":"reboot","payload":{}}"#.to_string(),
            r#"{"type":"update","payload":{"version":"2024.6.1"}}"#.to_string(),
        ]),
        ..Backend::default()
    })
    .await;
    let (dispatcher, mut rx) = recording_dispatcher(Duration::ZERO);
    let channel = ControlChannel::new(client(addr), dispatcher, fast_settings());

    assert!(channel.start());
    let first = next_command(&mut rx).await;
    let second = next_command(&mut rx).await;
    channel.stop().await;

    assert_eq!(first.kind, "restart");
    assert_eq!(second.kind, "update");
    assert_eq!(second.payload["version"], "2024.6.1");
    assert!(!channel.is_running());
}

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let addr = serve(Backend::default()).await;
    let channel = ControlChannel::new(client(addr), CommandDispatcher::new(), fast_settings());

    assert!(channel.start());
    assert!(!channel.start(), "second start is refused");
    assert!(channel.is_running());

    channel.stop().await;
    channel.stop().await;
    assert!(!channel.is_running());

    assert!(channel.start(), "restart after stop");
    channel.stop().await;
}

#[tokio::test]
async fn test_stream_reconnects_after_backend_closes() {
    let backend = Backend {
        frames: Arc::new(vec![r#"{"type":"patch","payload":{}}"#.to_string()]),
        close_after_frames: true,
        ..Backend::default()
    };
    let connections = backend.connections.clone();
    let addr = serve(backend).await;
    let (dispatcher, mut rx) = recording_dispatcher(Duration::ZERO);
    let channel = ControlChannel::new(client(addr), dispatcher, fast_settings());

    channel.start();
    assert_eq!(next_command(&mut rx).await.kind, "patch");
    assert_eq!(next_command(&mut rx).await.kind, "patch");
    channel.stop().await;

    assert!(connections.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_full_queue_applies_backpressure_without_dropping() {
    let frames = (0..6)
        .map(|i| format!(r#"{{"type":"update","payload":{{"seq":{i}}}}}"#))
        .collect();
    let addr = serve(Backend {
        frames: Arc::new(frames),
        ..Backend::default()
    })
    .await;
    let (dispatcher, mut rx) = recording_dispatcher(Duration::from_millis(50));
    let settings = ChannelSettings {
        queue_capacity: 1,
        ..fast_settings()
    };
    let channel = ControlChannel::new(client(addr), dispatcher, settings);

    channel.start();
    let mut seen = Vec::new();
    for _ in 0..6 {
        seen.push(next_command(&mut rx).await.payload["seq"].clone());
    }
    channel.stop().await;

    assert_eq!(seen, (0..6).map(|i| json!(i)).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_refresh_loop_updates_latest_credential() {
    let backend = Backend {
        token: "refreshed-token",
        ..Backend::default()
    };
    let calls = backend.token_calls.clone();
    let addr = serve(backend).await;
    let settings = ChannelSettings {
        refresh_interval: Duration::from_millis(100),
        ..fast_settings()
    };
    let channel = ControlChannel::new(client(addr), CommandDispatcher::new(), settings);

    channel.start();
    wait_until("two refreshes", || calls.load(Ordering::SeqCst) >= 2).await;
    channel.stop().await;

    assert_eq!(
        channel.latest_credential().map(|c| c.token().to_string()),
        Some("refreshed-token".to_string())
    );
}

#[tokio::test]
async fn test_stop_is_prompt_while_backend_is_unreachable() {
    let client = BackendClient::new("http://127.0.0.1:9").expect("client");
    let settings = ChannelSettings {
        reconnect_delay: Duration::from_secs(60),
        ..fast_settings()
    };
    let channel = ControlChannel::new(client, CommandDispatcher::new(), settings);

    channel.start();
    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::time::timeout(Duration::from_secs(3), channel.stop())
        .await
        .expect("stop does not wait out the reconnect delay");
    assert!(!channel.is_running());
}
