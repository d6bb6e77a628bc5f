//! `burrow status`: query the status server of a running `burrow run`.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use burrow_common::TunnelStatus;

use crate::app::AppContext;
use crate::output::json;

/// Run the status command.
///
/// Exits with status 1 when no tunnel is reachable on the configured port.
///
/// # Errors
///
/// Returns an error if the status server answers with an unexpected body.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    let url = format!("http://127.0.0.1:{}/api/status", config.web_server_port);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .context("cannot build HTTP client")?;
    let Ok(resp) = http.get(&url).send().await else {
        if app.is_json() {
            json::print(&TunnelStatus {
                tunnel_name: config.tunnel_name,
                ..TunnelStatus::default()
            })?;
        } else {
            app.output.info(&format!(
                "Tunnel '{}' is not running (nothing on port {})",
                config.tunnel_name, config.web_server_port
            ));
        }
        return Ok(ExitCode::FAILURE);
    };
    let status: TunnelStatus = resp
        .error_for_status()
        .with_context(|| format!("status server at {url} returned an error"))?
        .json()
        .await
        .context("cannot decode tunnel status")?;

    if app.is_json() {
        json::print(&status)?;
        return Ok(ExitCode::SUCCESS);
    }

    app.output.header(&format!("Tunnel {}", status.tunnel_name));
    app.output.phase(status.phase);
    if let Some(pid) = status.pid {
        app.output.kv("pid", &pid.to_string());
    }
    if status.tunnel_url.is_empty() {
        app.output.kv("url", "(waiting for agent)");
    } else {
        app.output.kv("url", &status.tunnel_url);
    }
    if !status.logs.is_empty() {
        app.output.header("Recent agent output");
        app.output.agent_log(status.logs.iter().rev().take(5).rev());
    }
    Ok(ExitCode::SUCCESS)
}
