//! `burrow run`: start the tunnel and supervise it until Ctrl-C or exit.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use burrow_common::TunnelPhase;
use clap::Args;
use serde_json::json;
use tokio::sync::watch;
use tracing::warn;

use crate::app::{
    AgentSupervisor, AppContext, build_backend, build_control_channel, build_supervisor,
};
use crate::application::services::tunnel::{StartHooks, TunnelOrchestrator};
use crate::infra::status_server::StatusServer;
use crate::output::{json, progress};

/// How often the agent output is scanned for the public URL.
const URL_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Use this tunnel token instead of fetching one from the backend
    #[arg(long, env = "BURROW_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Do not connect to the backend (requires --token)
    #[arg(long)]
    pub offline: bool,

    /// Keep the agent binary in the cache after exit
    #[arg(long)]
    pub keep_binary: bool,
}

/// Run the tunnel in the foreground.
///
/// # Errors
///
/// Returns an error if the tunnel cannot be started.
pub async fn run(app: &AppContext, args: RunArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let token = args.token.unwrap_or_default();
    if args.offline && token.trim().is_empty() {
        anyhow::bail!("--offline requires --token (or BURROW_TOKEN)");
    }

    let supervisor = build_supervisor(&config)?;
    let client = build_backend(&config)?;
    let channel = build_control_channel(&config, client.clone());

    let status_source = supervisor.clone();
    let companion = Arc::new(StatusServer::new(move || status_source.status()));
    let mut hooks = StartHooks::new().with_companion(companion.clone(), config.web_server_port);
    if !args.offline {
        hooks = hooks.with_status_sink(Arc::new(client));
        channel.start();
    }
    supervisor.set_observer(Some(Arc::new(hooks)));

    let orchestrator = TunnelOrchestrator::new(channel.clone(), supervisor.clone());
    let mut phases = supervisor.subscribe();

    let pb = app
        .output
        .show_progress()
        .then(|| progress::spinner("Starting tunnel..."));
    let started = orchestrator.start_tunnel(&token).await;
    if let Some(pb) = &pb {
        match &started {
            Ok(()) => progress::finish_ok(pb, &format!("Tunnel '{}' started", config.tunnel_name)),
            Err(_) => progress::finish_error(pb, "Tunnel failed to start"),
        }
    }
    if let Err(e) = started {
        supervisor.set_observer(None);
        channel.stop().await;
        return Err(e).context("failed to start tunnel");
    }

    let code = wait_for_exit(app, &supervisor, &mut phases).await;

    if supervisor.phase() == TunnelPhase::Running
        && let Err(e) = orchestrator.stop_tunnel().await
    {
        warn!(error = %e, "failed to stop tunnel");
    }
    // Drop the observer first: it holds the status server, which holds the
    // supervisor.
    supervisor.set_observer(None);
    companion.stop().await;
    channel.stop().await;
    if !args.keep_binary
        && let Err(e) = supervisor.cleanup()
    {
        app.output.warn(&format!("Could not remove agent binary: {e}"));
    }

    if app.is_json() {
        json::print(&orchestrator.status())?;
    } else {
        app.output.success("Tunnel stopped");
    }
    Ok(code)
}

/// Block until Ctrl-C or agent exit, printing the public URL once seen.
async fn wait_for_exit(
    app: &AppContext,
    supervisor: &AgentSupervisor,
    phases: &mut watch::Receiver<TunnelPhase>,
) -> ExitCode {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut poll = tokio::time::interval(URL_POLL_INTERVAL);
    let mut url_shown = false;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                app.output.info("Stopping tunnel...");
                return ExitCode::SUCCESS;
            }
            changed = phases.changed() => {
                if changed.is_err() {
                    return ExitCode::FAILURE;
                }
                let phase = *phases.borrow_and_update();
                match phase {
                    TunnelPhase::Crashed => {
                        app.output.error("Tunnel agent exited unexpectedly");
                        let logs = supervisor.status().logs;
                        app.output.agent_log(logs.iter().rev().take(10).rev());
                        return ExitCode::FAILURE;
                    }
                    TunnelPhase::Idle => {
                        app.output.info("Tunnel agent exited");
                        return ExitCode::SUCCESS;
                    }
                    TunnelPhase::Starting | TunnelPhase::Running | TunnelPhase::Stopping => {}
                }
            }
            _ = poll.tick(), if !url_shown => {
                let url = supervisor.tunnel_url();
                if !url.is_empty() {
                    url_shown = true;
                    if app.is_json() {
                        println!("{}", json!({ "tunnelURL": url }));
                    } else {
                        app.output.success("Tunnel is reachable at");
                        app.output.url(&url);
                    }
                }
            }
        }
    }
}
