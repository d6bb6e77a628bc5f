//! Application service: the tunnel use-case.
//!
//! Composes credential acquisition with the process supervisor and provides
//! the on-start hooks (companion server, status report) run after every
//! successful start.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use burrow_common::{TunnelPhase, TunnelStatus};
use tracing::{debug, info};

use crate::application::ports::{
    AgentLauncher, BinaryProvider, CompanionServer, CredentialSource, StartObserver, StatusSink,
    TunnelStarted,
};
use crate::application::services::supervisor::ProcessSupervisor;
use crate::domain::{Credential, SupervisorError, TunnelError};

/// Starts and stops the tunnel on behalf of the presentation layer.
pub struct TunnelOrchestrator<C, P, L> {
    credentials: C,
    supervisor: ProcessSupervisor<P, L>,
}

impl<C, P, L> TunnelOrchestrator<C, P, L>
where
    C: CredentialSource,
    P: BinaryProvider,
    L: AgentLauncher,
{
    pub fn new(credentials: C, supervisor: ProcessSupervisor<P, L>) -> Self {
        Self {
            credentials,
            supervisor,
        }
    }

    /// Start the tunnel. A non-empty `manual_token` is used as-is and the
    /// credential source is never consulted.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::AlreadyRunning`], [`TunnelError::Credential`],
    /// [`TunnelError::Provision`] or [`TunnelError::Launch`]. On any error the
    /// supervisor is left without a running agent.
    pub async fn start_tunnel(&self, manual_token: &str) -> Result<(), TunnelError> {
        if !self.supervisor.phase().is_terminal() {
            return Err(TunnelError::AlreadyRunning);
        }

        let manual_token = manual_token.trim();
        let credential = if manual_token.is_empty() {
            let credential = self.credentials.fetch_credential().await?;
            debug!(token = %credential.preview(), "using backend-issued token");
            credential
        } else {
            info!("using manually supplied token");
            Credential::manual(manual_token)
        };

        self.supervisor.start(&credential).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`SupervisorError::NotRunning`] if no agent is running.
    pub async fn stop_tunnel(&self) -> Result<(), SupervisorError> {
        self.supervisor.stop().await
    }

    #[must_use]
    pub fn status(&self) -> TunnelStatus {
        self.supervisor.status()
    }

    pub fn supervisor(&self) -> &ProcessSupervisor<P, L> {
        &self.supervisor
    }
}

// ── On-start hooks ────────────────────────────────────────────────────────────

/// Observer that brings up dependent features once the agent is running.
///
/// Each hook runs even when an earlier one fails; failures are collected into
/// one error for the supervisor to log.
#[derive(Default)]
pub struct StartHooks {
    companion: Option<(Arc<dyn CompanionServer>, u16)>,
    status_sink: Option<Arc<dyn StatusSink>>,
}

impl StartHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `server` on `port` unless it is already running.
    #[must_use]
    pub fn with_companion(mut self, server: Arc<dyn CompanionServer>, port: u16) -> Self {
        self.companion = Some((server, port));
        self
    }

    /// Report the new tunnel status to `sink`.
    #[must_use]
    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.status_sink = Some(sink);
        self
    }
}

#[async_trait]
impl StartObserver for StartHooks {
    async fn on_tunnel_start(&self, started: &TunnelStarted) -> Result<()> {
        let mut failures = Vec::new();

        if let Some((server, port)) = &self.companion {
            if server.is_running() {
                debug!(port, "companion server already running");
            } else {
                match server.start(*port).await {
                    Ok(()) => info!(port, "companion server started"),
                    Err(e) => failures.push(format!("companion server: {e:#}")),
                }
            }
        }

        if let Some(sink) = &self.status_sink {
            let status = TunnelStatus {
                running: true,
                phase: TunnelPhase::Running,
                tunnel_name: started.tunnel_name.clone(),
                tunnel_url: String::new(),
                pid: started.pid,
                logs: Vec::new(),
            };
            if let Err(e) = sink.report_status(&status).await {
                failures.push(format!("status report: {e:#}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!(failures.join("; "))
        }
    }
}
