//! Application service: supervision of the tunnel agent process.
//!
//! The supervisor owns at most one agent process at a time. It drives the
//! lifecycle `Idle -> Starting -> Running -> (Stopping -> Idle) | Crashed`,
//! captures the agent's stdout/stderr into a bounded [`LogRing`] and notifies
//! a single [`StartObserver`] after each successful start.
//!
//! All shared state sits behind one `parking_lot::RwLock`; no lock guard is
//! ever held across an `.await`.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use burrow_common::{RouteMapping, TunnelPhase, TunnelStatus};
use parking_lot::RwLock;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::{
    AgentLauncher, BinaryProvider, IngressWriter, StartObserver, TunnelStarted,
};
use crate::domain::{Credential, IngressDocument, LogRing, ProvisionError, SupervisorError};

/// Time the agent gets to honour SIGTERM before it is killed.
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);
/// Upper bound on how long `stop` waits for the monitor to observe exit.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);
/// How long the monitor waits for output readers to drain after exit.
pub const DEFAULT_READER_DRAIN: Duration = Duration::from_secs(2);

/// Construction-time options for [`ProcessSupervisor`].
#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub tunnel_name: String,
    pub routes: Vec<RouteMapping>,
    pub stop_grace: Duration,
    pub stop_timeout: Duration,
    pub reader_drain: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            tunnel_name: crate::domain::config::DEFAULT_TUNNEL_NAME.to_string(),
            routes: Vec::new(),
            stop_grace: DEFAULT_STOP_GRACE,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            reader_drain: DEFAULT_READER_DRAIN,
        }
    }
}

// ── Shared state ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct RunState {
    phase: TunnelPhase,
    /// Incremented on every start; the monitor only touches state for its own run.
    generation: u64,
    logs: LogRing,
    binary: Option<PathBuf>,
    pid: Option<u32>,
    stop_tx: Option<oneshot::Sender<()>>,
    done_rx: Option<oneshot::Receiver<()>>,
}

/// The part of the supervisor the output readers need.
struct Shared {
    state: RwLock<RunState>,
    phase_tx: watch::Sender<TunnelPhase>,
}

impl Shared {
    fn set_phase(&self, phase: TunnelPhase) {
        self.state.write().phase = phase;
        self.phase_tx.send_replace(phase);
    }
}

struct Inner<P, L> {
    provider: P,
    launcher: L,
    ingress: Arc<dyn IngressWriter>,
    shared: Arc<Shared>,
    tunnel_name: String,
    routes: Vec<RouteMapping>,
    observer: RwLock<Option<Arc<dyn StartObserver>>>,
    stop_grace: Duration,
    stop_timeout: Duration,
    reader_drain: Duration,
}

// ── Supervisor ────────────────────────────────────────────────────────────────

/// Single-instance supervisor of the tunnel agent. Cheap to clone.
pub struct ProcessSupervisor<P, L> {
    inner: Arc<Inner<P, L>>,
}

impl<P, L> Clone for ProcessSupervisor<P, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: BinaryProvider, L: AgentLauncher> ProcessSupervisor<P, L> {
    pub fn new(
        provider: P,
        launcher: L,
        ingress: Arc<dyn IngressWriter>,
        options: SupervisorOptions,
    ) -> Self {
        let (phase_tx, _) = watch::channel(TunnelPhase::Idle);
        Self {
            inner: Arc::new(Inner {
                provider,
                launcher,
                ingress,
                shared: Arc::new(Shared {
                    state: RwLock::new(RunState::default()),
                    phase_tx,
                }),
                tunnel_name: options.tunnel_name,
                routes: options.routes,
                observer: RwLock::new(None),
                stop_grace: options.stop_grace,
                stop_timeout: options.stop_timeout,
                reader_drain: options.reader_drain,
            }),
        }
    }

    /// Register (or clear) the single on-start observer.
    pub fn set_observer(&self, observer: Option<Arc<dyn StartObserver>>) {
        *self.inner.observer.write() = observer;
    }

    /// Start the agent with `credential`.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::AlreadyRunning`] unless the supervisor is
    /// idle or crashed; provisioning, ingress and launch failures are
    /// returned as-is and leave the supervisor idle.
    pub async fn start(&self, credential: &Credential) -> Result<(), SupervisorError> {
        let generation = {
            let mut st = self.inner.shared.state.write();
            if !st.phase.is_terminal() {
                return Err(SupervisorError::AlreadyRunning);
            }
            st.phase = TunnelPhase::Starting;
            st.generation += 1;
            st.logs.clear();
            st.pid = None;
            st.generation
        };
        self.inner.shared.phase_tx.send_replace(TunnelPhase::Starting);

        match self.launch(credential, generation).await {
            Ok(started) => {
                self.notify(started);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "tunnel start failed");
                self.inner.shared.set_phase(TunnelPhase::Idle);
                Err(e)
            }
        }
    }

    async fn launch(
        &self,
        credential: &Credential,
        generation: u64,
    ) -> Result<TunnelStarted, SupervisorError> {
        let binary = self.inner.provider.obtain().await?;
        let args = self.invocation(credential)?;
        let mut child = self.inner.launcher.launch(&binary, &args)?;
        let pid = child.id();

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(Arc::clone(&self.inner.shared), stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(Arc::clone(&self.inner.shared), stderr, "stderr"));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        {
            let mut st = self.inner.shared.state.write();
            st.phase = TunnelPhase::Running;
            st.binary = Some(binary.clone());
            st.pid = pid;
            st.stop_tx = Some(stop_tx);
            st.done_rx = Some(done_rx);
        }
        self.inner.shared.phase_tx.send_replace(TunnelPhase::Running);

        info!(
            pid,
            binary = %binary.display(),
            token = %credential.preview(),
            "tunnel agent started"
        );

        tokio::spawn(monitor(
            Arc::clone(&self.inner),
            child,
            readers,
            generation,
            stop_rx,
            done_tx,
        ));

        Ok(TunnelStarted {
            tunnel_name: self.inner.tunnel_name.clone(),
            pid,
            binary,
        })
    }

    /// Build the agent's argument vector, writing the ingress file when
    /// routes are configured.
    fn invocation(&self, credential: &Credential) -> Result<Vec<String>, SupervisorError> {
        let mut args = vec![
            "tunnel".to_string(),
            "run".to_string(),
            "--token".to_string(),
            credential.token().to_string(),
        ];
        let routes = &self.inner.routes;
        if routes.is_empty() {
            debug!("no routes configured, running in token-only mode");
        } else {
            let path = self.inner.ingress.write(&IngressDocument::from_routes(routes))?;
            debug!(routes = routes.len(), config = %path.display(), "running with ingress config");
            args.push("--config".to_string());
            args.push(path.display().to_string());
        }
        Ok(args)
    }

    fn notify(&self, started: TunnelStarted) {
        let Some(observer) = self.inner.observer.read().clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = observer.on_tunnel_start(&started).await {
                warn!(error = %format!("{e:#}"), "on-start notification failed");
            }
        });
    }

    /// Terminate the running agent and wait (bounded) for it to exit.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] unless the agent is running;
    /// in that case nothing is changed.
    pub async fn stop(&self) -> Result<(), SupervisorError> {
        let (stop_tx, done_rx) = {
            let mut st = self.inner.shared.state.write();
            if st.phase != TunnelPhase::Running {
                return Err(SupervisorError::NotRunning);
            }
            st.phase = TunnelPhase::Stopping;
            (st.stop_tx.take(), st.done_rx.take())
        };
        self.inner.shared.phase_tx.send_replace(TunnelPhase::Stopping);

        if let Some(tx) = stop_tx {
            let _ = tx.send(());
        }
        if let Some(rx) = done_rx
            && tokio::time::timeout(self.inner.stop_timeout, rx).await.is_err()
        {
            warn!(
                timeout_secs = self.inner.stop_timeout.as_secs(),
                "agent did not exit in time, marking tunnel stopped anyway"
            );
        }

        self.inner.shared.set_phase(TunnelPhase::Idle);
        info!("tunnel stopped");
        Ok(())
    }

    /// Best-effort snapshot; never waits on the agent.
    #[must_use]
    pub fn status(&self) -> TunnelStatus {
        let st = self.inner.shared.state.read();
        TunnelStatus {
            running: st.phase == TunnelPhase::Running,
            phase: st.phase,
            tunnel_name: self.inner.tunnel_name.clone(),
            tunnel_url: st.logs.tunnel_url().unwrap_or_default(),
            pid: st.pid,
            logs: st.logs.snapshot(),
        }
    }

    /// Public URL scraped from agent output, or an empty string.
    #[must_use]
    pub fn tunnel_url(&self) -> String {
        self.inner
            .shared
            .state
            .read()
            .logs
            .tunnel_url()
            .unwrap_or_default()
    }

    #[must_use]
    pub fn phase(&self) -> TunnelPhase {
        self.inner.shared.state.read().phase
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase() == TunnelPhase::Running
    }

    /// Path of the binary used by the most recent start.
    #[must_use]
    pub fn binary_path(&self) -> Option<PathBuf> {
        self.inner.shared.state.read().binary.clone()
    }

    /// Watch phase transitions, e.g. to wait for the agent to exit.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<TunnelPhase> {
        self.inner.shared.phase_tx.subscribe()
    }

    /// Delete the last-used cached binary. Meant for application teardown,
    /// independent of `stop`.
    ///
    /// # Errors
    ///
    /// Returns an error if the binary exists but cannot be deleted.
    pub fn cleanup(&self) -> Result<(), ProvisionError> {
        if self.is_running() {
            warn!("cleaning up the agent binary while the tunnel is still running");
        }
        self.inner.provider.purge()
    }
}

// ── Background tasks ──────────────────────────────────────────────────────────

fn spawn_reader<R>(shared: Arc<Shared>, stream: R, source: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\r', '\n']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    debug!(target: "burrow::agent", source, "{line}");
                    shared.state.write().logs.push(line);
                }
                Err(e) => {
                    debug!(source, error = %e, "agent output stream closed");
                    break;
                }
            }
        }
    })
}

async fn monitor<P: BinaryProvider, L: AgentLauncher>(
    inner: Arc<Inner<P, L>>,
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    generation: u64,
    stop_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<()>,
) {
    let (status, requested) = tokio::select! {
        status = child.wait() => (status, false),
        _ = stop_rx => (terminate(&mut child, inner.stop_grace).await, true),
    };

    // Let the readers flush what the agent wrote before exiting.
    let deadline = tokio::time::Instant::now() + inner.reader_drain;
    for mut handle in readers {
        if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
            handle.abort();
        }
    }

    let (line, phase) = match &status {
        Ok(s) if s.success() => ("Process exited".to_string(), TunnelPhase::Idle),
        Ok(s) => (
            format!("Process exited: {s}"),
            if requested {
                TunnelPhase::Idle
            } else {
                TunnelPhase::Crashed
            },
        ),
        Err(e) => (format!("Process exited: {e}"), TunnelPhase::Crashed),
    };
    match &status {
        Ok(s) if requested || s.success() => info!(status = %s, "tunnel agent exited"),
        Ok(s) => warn!(status = %s, "tunnel agent exited unexpectedly"),
        Err(e) => warn!(error = %e, "failed to wait for tunnel agent"),
    }

    let current = {
        let mut st = inner.shared.state.write();
        if st.generation == generation {
            st.logs.push(line);
            st.pid = None;
            st.stop_tx = None;
            if st.phase != TunnelPhase::Stopping {
                st.phase = phase;
            }
            Some(st.phase)
        } else {
            None
        }
    };
    // A stale monitor must not release a binary the newer run is using.
    if let Some(phase) = current {
        inner.shared.phase_tx.send_replace(phase);
        inner.provider.release();
    }
    let _ = done_tx.send(());
}

/// SIGTERM, then SIGKILL if the agent is still alive after `grace`.
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    signal_terminate(child);
    if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
        return status;
    }
    warn!(
        grace_secs = grace.as_secs(),
        "agent ignored termination signal, killing"
    );
    child.kill().await?;
    child.wait().await
}

#[cfg(unix)]
fn signal_terminate(child: &mut Child) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(pid, error = %e, "failed to send SIGTERM to agent");
    }
}

#[cfg(not(unix))]
fn signal_terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to terminate agent");
    }
}
