//! Application context and wiring of the concrete tunnel stack.
//!
//! `AppContext` is constructed once in `Cli::run()` and passed to every
//! command handler. The `build_*` helpers assemble the production
//! implementations of the application ports from a loaded [`BurrowConfig`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::application::services::dispatch::CommandDispatcher;
use crate::application::services::supervisor::{ProcessSupervisor, SupervisorOptions};
use crate::domain::{BurrowConfig, Platform};
use crate::infra::backend::BackendClient;
use crate::infra::config::YamlConfigStore;
use crate::infra::control::{ChannelSettings, ControlChannel};
use crate::infra::fs::{IngressFileWriter, cache_dir, config_dir};
use crate::infra::launcher::TokioAgentLauncher;
use crate::infra::provisioner::BinaryProvisioner;
use crate::infra::{DefaultSource, default_source};
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags passed from the top-level CLI.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Configuration persistence.
    pub config_store: YamlConfigStore,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config location cannot be determined.
    pub fn new(flags: &OutputFlags) -> Result<Self> {
        let mode = if flags.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        Ok(Self {
            output: OutputContext::new(flags.no_color, flags.quiet),
            mode,
            config_store: YamlConfigStore::new()?,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Load the stored configuration, or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but is unreadable.
    pub fn load_config(&self) -> Result<BurrowConfig> {
        self.config_store.load()
    }
}

// ── Wiring ────────────────────────────────────────────────────────────────────

/// Provisioner over the build-selected binary source.
pub type AgentProvisioner = BinaryProvisioner<DefaultSource>;

/// Supervisor as wired for the CLI.
pub type AgentSupervisor = ProcessSupervisor<AgentProvisioner, TokioAgentLauncher>;

/// # Errors
///
/// Returns an error on unsupported platforms or when no cache directory
/// exists.
pub fn build_provisioner(config: &BurrowConfig) -> Result<AgentProvisioner> {
    let platform = Platform::current()?;
    Ok(BinaryProvisioner::new(
        default_source(),
        cache_dir()?,
        platform,
        config.retention,
    ))
}

/// # Errors
///
/// Returns an error if the provisioner cannot be built or the config
/// directory is unknown.
pub fn build_supervisor(config: &BurrowConfig) -> Result<AgentSupervisor> {
    let ingress = IngressFileWriter::new(config_dir()?);
    Ok(ProcessSupervisor::new(
        build_provisioner(config)?,
        TokioAgentLauncher,
        Arc::new(ingress),
        SupervisorOptions {
            tunnel_name: config.tunnel_name.clone(),
            routes: config.routes.clone(),
            ..SupervisorOptions::default()
        },
    ))
}

/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn build_backend(config: &BurrowConfig) -> Result<BackendClient> {
    BackendClient::new(&config.backend_url)
        .with_context(|| format!("invalid backend {}", config.backend_url))
}

#[must_use]
pub fn build_control_channel(config: &BurrowConfig, client: BackendClient) -> ControlChannel {
    ControlChannel::new(
        client,
        CommandDispatcher::with_default_handlers(),
        ChannelSettings {
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            ..ChannelSettings::default()
        },
    )
}
