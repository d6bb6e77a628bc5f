//! Local companion server exposing the tunnel status over HTTP.
//!
//! Routes: `/health` for probes, `/api/status` for the JSON snapshot, and a
//! plain-text summary for everything else.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use burrow_common::TunnelStatus;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::ports::CompanionServer;

type StatusFn = Arc<dyn Fn() -> TunnelStatus + Send + Sync>;

#[derive(Clone)]
struct AppState {
    status: StatusFn,
    port: u16,
}

struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Serves the status snapshot produced by `status` on `127.0.0.1`.
pub struct StatusServer {
    status: StatusFn,
    running: Mutex<Option<Running>>,
}

impl StatusServer {
    pub fn new(status: impl Fn() -> TunnelStatus + Send + Sync + 'static) -> Self {
        Self {
            status: Arc::new(status),
            running: Mutex::new(None),
        }
    }

    /// Bound address while running. Port 0 in `start` picks a free port.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.addr)
    }

    /// Shut the server down gracefully. No-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        let _ = running.shutdown.send(());
        if let Err(e) = running.handle.await {
            warn!(error = %e, "status server task failed");
        }
        info!(addr = %running.addr, "status server stopped");
    }
}

#[async_trait]
impl CompanionServer for StatusServer {
    fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    async fn start(&self, port: u16) -> Result<()> {
        anyhow::ensure!(!self.is_running(), "status server is already running");

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to start status server on port {port}"))?;
        let addr = listener.local_addr().context("cannot read bound address")?;

        let router = Router::new()
            .route("/health", get(health))
            .route("/api/status", get(status_json))
            .fallback(status_text)
            .with_state(AppState {
                status: Arc::clone(&self.status),
                port: addr.port(),
            });

        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = served {
                warn!(error = %e, "status server failed");
            }
        });

        let mut running = self.running.lock();
        if running.is_some() {
            handle.abort();
            anyhow::bail!("status server is already running");
        }
        *running = Some(Running {
            addr,
            shutdown,
            handle,
        });
        info!(%addr, "status server listening");
        Ok(())
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "status": "ok", "port": state.port }))
}

async fn status_json(State(state): State<AppState>) -> Json<TunnelStatus> {
    Json((state.status)())
}

async fn status_text(State(state): State<AppState>) -> String {
    let status = (state.status)();
    let url = if status.tunnel_url.is_empty() {
        "(pending)"
    } else {
        status.tunnel_url.as_str()
    };
    format!(
        "tunnel: {}\nphase: {:?}\nurl: {url}\n",
        status.tunnel_name, status.phase
    )
}
