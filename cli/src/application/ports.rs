//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `burrow_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use burrow_common::{CommandEnvelope, TunnelStatus};

use crate::domain::{
    BurrowConfig, CommandError, Credential, CredentialError, IngressDocument, Platform,
    ProvisionError, SupervisorError,
};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Details of a successful start, handed to the [`StartObserver`].
#[derive(Debug, Clone)]
pub struct TunnelStarted {
    pub tunnel_name: String,
    pub pid: Option<u32>,
    pub binary: PathBuf,
}

// ── Provisioning Ports ────────────────────────────────────────────────────────

/// One strategy for producing the agent executable: bundled extraction or
/// remote fetch. Blocking; callers run it off the async runtime.
pub trait BinarySource: Send + Sync + 'static {
    /// Write the executable for `platform` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact cannot be obtained or written.
    fn fetch(&self, platform: Platform, dest: &Path) -> Result<(), ProvisionError>;

    /// Short human-readable name of the strategy, for logs.
    fn describe(&self) -> String;
}

/// Hands out a validated agent executable to the supervisor.
#[allow(async_fn_in_trait)]
pub trait BinaryProvider: Send + Sync + 'static {
    /// Return the path of a binary that satisfies the size and permission
    /// invariants, provisioning it first if needed.
    async fn obtain(&self) -> Result<PathBuf, ProvisionError>;

    /// Called when a run ends. Ephemeral retention deletes the binary here.
    fn release(&self);

    /// Delete the last-used binary regardless of retention.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn purge(&self) -> Result<(), ProvisionError>;
}

// ── Process Ports ─────────────────────────────────────────────────────────────

/// Spawns the agent process with piped stdout/stderr.
pub trait AgentLauncher: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns [`SupervisorError::Launch`] if the OS refuses to spawn.
    fn launch(
        &self,
        program: &Path,
        args: &[String],
    ) -> Result<tokio::process::Child, SupervisorError>;
}

/// Persists the generated ingress document where the agent can read it.
pub trait IngressWriter: Send + Sync + 'static {
    /// # Errors
    ///
    /// Returns [`SupervisorError::Ingress`] if the file cannot be written.
    fn write(&self, doc: &IngressDocument) -> Result<PathBuf, SupervisorError>;
}

// ── Control Channel Ports ─────────────────────────────────────────────────────

/// Issues the credential a tunnel run needs.
#[allow(async_fn_in_trait)]
pub trait CredentialSource {
    async fn fetch_credential(&self) -> Result<Credential, CredentialError>;
}

/// Handles one command kind pushed by the backend.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, envelope: &CommandEnvelope) -> Result<(), CommandError>;
}

// ── Notification Ports ────────────────────────────────────────────────────────

/// Single-slot observer invoked once per successful start. Failures are
/// logged by the supervisor and never undo the start.
#[async_trait]
pub trait StartObserver: Send + Sync {
    async fn on_tunnel_start(&self, started: &TunnelStarted) -> Result<()>;
}

/// Local server started alongside the tunnel.
#[async_trait]
pub trait CompanionServer: Send + Sync {
    fn is_running(&self) -> bool;
    async fn start(&self, port: u16) -> Result<()>;
}

/// Receives tunnel status reports (the backend's `/api/status`).
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn report_status(&self, status: &TunnelStatus) -> Result<()>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the configuration, returning defaults if none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored file exists but cannot be parsed.
    fn load(&self) -> Result<BurrowConfig>;

    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &BurrowConfig) -> Result<()>;

    /// Location of the backing file.
    fn path(&self) -> &Path;
}
