//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Provisioning errors ───────────────────────────────────────────────────────

/// Why a file on disk does not qualify as a usable agent binary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BinaryDefect {
    #[error("file does not exist")]
    Missing,

    #[error("file is {size} bytes, below the {minimum} byte minimum")]
    TooSmall { size: u64, minimum: u64 },

    #[error("file is not executable and permissions could not be repaired: {0}")]
    NotExecutable(String),
}

/// Errors raised while resolving, downloading, extracting or validating the
/// agent executable. Re-invoking the provisioner is always safe.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported platform: {os}-{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("cannot determine the cache directory for this platform")]
    NoCacheDir,

    #[error("release lookup failed: {0}")]
    Network(String),

    #[error("'{member}' not found in {archive}")]
    MemberNotFound { member: String, archive: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("agent binary at {} is not usable: {defect}", path.display())]
    InvalidBinary { path: PathBuf, defect: BinaryDefect },

    #[error("provisioning task failed: {0}")]
    Task(String),
}

impl ProvisionError {
    /// Wrap an I/O error with a short description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Network failures clear up on their own; everything else needs a fix
    /// on the local machine first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

// ── Supervisor errors ─────────────────────────────────────────────────────────

/// Errors returned by the process supervisor's `start`/`stop` operations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("tunnel is already running")]
    AlreadyRunning,

    #[error("tunnel is not running")]
    NotRunning,

    #[error("failed to prepare agent binary: {0}")]
    Provision(#[from] ProvisionError),

    #[error("failed to launch {}: {source}", program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write ingress config {}: {reason}", path.display())]
    Ingress { path: PathBuf, reason: String },
}

// ── Control channel errors ────────────────────────────────────────────────────

/// Credential acquisition failures. None of these ever produce a cached token.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to reach backend: {0}")]
    Transport(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode token response: {0}")]
    Decode(String),

    #[error("backend returned an empty token")]
    EmptyToken,
}

/// Reasons a command-stream session ended. Only ever logged; the reconnect
/// loop recovers from all of them.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("connect timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("read failed: {0}")]
    Read(String),

    #[error("connection closed by backend")]
    Closed,

    #[error("command queue closed")]
    QueueClosed,
}

/// Command dispatch failures. Logged and dropped, never fatal.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command kind '{0}'")]
    UnknownKind(String),

    #[error("no handler registered for '{0}'")]
    Unhandled(String),

    #[error("'{kind}' handler failed: {message}")]
    Handler { kind: String, message: String },
}

// ── Orchestrator errors ───────────────────────────────────────────────────────

/// Errors surfaced by `start_tunnel`, keeping each failure class distinct.
#[derive(Debug, Error)]
pub enum TunnelError {
    #[error("tunnel is already running")]
    AlreadyRunning,

    #[error("failed to get token: {0}")]
    Credential(#[from] CredentialError),

    #[error("failed to prepare agent binary: {0}")]
    Provision(ProvisionError),

    #[error("failed to launch tunnel: {0}")]
    Launch(SupervisorError),
}

impl From<SupervisorError> for TunnelError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::AlreadyRunning => Self::AlreadyRunning,
            SupervisorError::Provision(e) => Self::Provision(e),
            other => Self::Launch(other),
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },

    #[error("Invalid route: {0}")]
    InvalidRoute(String),
}
