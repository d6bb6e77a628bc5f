//! Backend control channel.
//!
//! While started, three tasks run until [`ControlChannel::stop`]:
//!
//! - the **stream loop** keeps a WebSocket open to `{base}/api/commands`,
//!   decodes command envelopes and feeds them into a bounded queue; after any
//!   disconnect it waits the reconnect delay and dials again;
//! - the **refresh loop** re-fetches the credential on a fixed interval;
//! - the **dispatch loop** drains the queue into the [`CommandDispatcher`].
//!
//! Every loop watches one `CancellationToken` per start. Failures inside the
//! loops are logged and never surface to callers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use burrow_common::CommandEnvelope;
use futures_util::StreamExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::CredentialSource;
use crate::application::services::dispatch::CommandDispatcher;
use crate::domain::{Credential, CredentialError, StreamError};
use crate::infra::backend::BackendClient;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(30);
/// How long `stop` waits for each task before aborting it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing and sizing knobs of the control channel.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub reconnect_delay: Duration,
    pub refresh_interval: Duration,
    pub queue_capacity: usize,
    pub dial_timeout: Duration,
    pub stop_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }
}

struct Session {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

struct Inner {
    client: BackendClient,
    dispatcher: CommandDispatcher,
    settings: ChannelSettings,
    running: AtomicBool,
    session: Mutex<Option<Session>>,
    latest: RwLock<Option<Credential>>,
}

/// Persistent link to the backend. Cheap to clone.
#[derive(Clone)]
pub struct ControlChannel {
    inner: Arc<Inner>,
}

impl ControlChannel {
    #[must_use]
    pub fn new(
        client: BackendClient,
        dispatcher: CommandDispatcher,
        settings: ChannelSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                dispatcher,
                settings,
                running: AtomicBool::new(false),
                session: Mutex::new(None),
                latest: RwLock::new(None),
            }),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Most recent credential obtained by a successful fetch or refresh.
    #[must_use]
    pub fn latest_credential(&self) -> Option<Credential> {
        self.inner.latest.read().clone()
    }

    /// Spawn the stream, refresh and dispatch loops. Returns `false` if the
    /// channel was already running.
    pub fn start(&self) -> bool {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            debug!("control channel already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.inner.settings.queue_capacity.max(1));
        let tasks = vec![
            tokio::spawn(stream_loop(Arc::clone(&self.inner), tx, cancel.clone())),
            tokio::spawn(refresh_loop(Arc::clone(&self.inner), cancel.clone())),
            tokio::spawn(dispatch_loop(Arc::clone(&self.inner), rx, cancel.clone())),
        ];
        *self.inner.session.lock() = Some(Session { cancel, tasks });

        info!(
            url = %self.inner.client.stream_url(),
            refresh_secs = self.inner.settings.refresh_interval.as_secs(),
            "control channel started"
        );
        true
    }

    /// Cancel all loops, close the connection and the queue, and wait
    /// (bounded) for the tasks to finish. Calling it again is a no-op.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::SeqCst) {
            debug!("control channel already stopped");
            return;
        }
        let Some(session) = self.inner.session.lock().take() else {
            return;
        };
        session.cancel.cancel();
        for mut task in session.tasks {
            if tokio::time::timeout(self.inner.settings.stop_timeout, &mut task)
                .await
                .is_err()
            {
                warn!("control channel task did not stop in time, aborting");
                task.abort();
            }
        }
        info!("control channel stopped");
    }
}

impl CredentialSource for ControlChannel {
    async fn fetch_credential(&self) -> Result<Credential, CredentialError> {
        fetch_and_remember(&self.inner).await
    }
}

/// Fetch a credential and keep it as the latest. Failures never replace a
/// previously stored credential.
async fn fetch_and_remember(inner: &Inner) -> Result<Credential, CredentialError> {
    let credential = inner.client.fetch_credential().await?;
    *inner.latest.write() = Some(credential.clone());
    Ok(credential)
}

// ── Loops ─────────────────────────────────────────────────────────────────────

async fn stream_loop(
    inner: Arc<Inner>,
    tx: mpsc::Sender<CommandEnvelope>,
    cancel: CancellationToken,
) {
    let url = inner.client.stream_url();
    let delay = inner.settings.reconnect_delay;
    loop {
        match run_session(&inner, &url, &tx, &cancel).await {
            Ok(()) => break,
            Err(e) => warn!(error = %e, delay_secs = delay.as_secs(), "command stream down, reconnecting"),
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }
    // Dropping `tx` here closes the queue for the dispatch loop.
    debug!("stream loop exited");
}

/// One connection's lifetime. `Ok(())` means cancellation was requested.
async fn run_session(
    inner: &Inner,
    url: &str,
    tx: &mpsc::Sender<CommandEnvelope>,
    cancel: &CancellationToken,
) -> Result<(), StreamError> {
    let dial_timeout = inner.settings.dial_timeout;
    let dial = tokio::time::timeout(dial_timeout, tokio_tungstenite::connect_async(url));
    let (mut ws, _) = tokio::select! {
        () = cancel.cancelled() => return Ok(()),
        dialed = dial => match dialed {
            Err(_) => return Err(StreamError::ConnectTimeout(dial_timeout.as_secs())),
            Ok(Err(e)) => return Err(StreamError::Connect(e.to_string())),
            Ok(Ok(conn)) => conn,
        },
    };
    info!(%url, "command stream connected");

    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws.close(None).await;
                return Ok(());
            }
            next = ws.next() => next,
        };

        let envelope = match next {
            None => return Err(StreamError::Closed),
            Some(Err(e)) => return Err(StreamError::Read(e.to_string())),
            Some(Ok(Message::Close(_))) => return Err(StreamError::Closed),
            Some(Ok(Message::Text(text))) => decode(text.as_bytes()),
            Some(Ok(Message::Binary(data))) => decode(&data),
            Some(Ok(_)) => continue,
        };
        let Some(envelope) = envelope else {
            continue;
        };
        debug!(kind = %envelope.kind, "command received");

        match tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Full(envelope)) => {
                warn!(
                    capacity = inner.settings.queue_capacity,
                    "command queue full, pausing stream reads until the dispatcher catches up"
                );
                tokio::select! {
                    () = cancel.cancelled() => {
                        let _ = ws.close(None).await;
                        return Ok(());
                    }
                    sent = tx.send(envelope) => {
                        if sent.is_err() {
                            return Err(StreamError::QueueClosed);
                        }
                    }
                }
            }
            Err(TrySendError::Closed(_)) => return Err(StreamError::QueueClosed),
        }
    }
}

/// Malformed messages are skipped; the connection stays up.
fn decode(data: &[u8]) -> Option<CommandEnvelope> {
    match serde_json::from_slice(data) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!(error = %e, "ignoring malformed command message");
            None
        }
    }
}

async fn refresh_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let period = inner.settings.refresh_interval;
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            () = cancel.cancelled() => break,
            fetched = fetch_and_remember(&inner) => match fetched {
                Ok(c) => debug!(token = %c.preview(), "credential refreshed"),
                Err(e) => warn!(error = %e, "credential refresh failed"),
            },
        }
    }
    debug!("refresh loop exited");
}

async fn dispatch_loop(
    inner: Arc<Inner>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            received = rx.recv() => match received {
                Some(envelope) => inner.dispatcher.dispatch_logged(&envelope).await,
                None => break,
            },
            () = cancel.cancelled() => {
                rx.close();
                while let Some(envelope) = rx.recv().await {
                    inner.dispatcher.dispatch_logged(&envelope).await;
                }
                break;
            }
        }
    }
    debug!("dispatch loop exited");
}
