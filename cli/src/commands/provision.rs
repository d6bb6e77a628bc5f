//! `burrow provision`: fetch (or reuse) the agent binary and report it.

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::json;

use crate::app::{AppContext, build_provisioner};
use crate::application::ports::BinaryProvider;
use crate::infra::fs::sha256_file;
use crate::output::{json, progress};

/// Run the provision command.
///
/// # Errors
///
/// Returns an error if provisioning fails or the binary cannot be hashed.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    let provisioner = build_provisioner(&config)?;

    let pb = app
        .output
        .show_progress()
        .then(|| progress::spinner("Provisioning tunnel agent..."));
    let obtained = provisioner.obtain().await;
    let path = match obtained {
        Ok(path) => {
            if let Some(pb) = &pb {
                progress::finish_ok(pb, "Tunnel agent ready");
            }
            path
        }
        Err(e) => {
            if let Some(pb) = &pb {
                progress::finish_error(pb, "Provisioning failed");
            }
            if e.is_retryable() {
                app.output.warn("Network error; running the command again may succeed");
            }
            return Err(e).context("failed to provision tunnel agent");
        }
    };

    let size = std::fs::metadata(&path)
        .with_context(|| format!("cannot stat {}", path.display()))?
        .len();
    let sha256 = sha256_file(&path)?;

    if app.is_json() {
        json::print(&json!({
            "path": path,
            "size": size,
            "sha256": sha256,
            "platform": provisioner.platform().to_string(),
            "retention": provisioner.retention().as_str(),
        }))?;
    } else {
        app.output.kv("path", &path.display().to_string());
        app.output.kv("size", &format!("{size} bytes"));
        app.output.kv("sha256", &sha256);
        app.output.kv("platform", &provisioner.platform().to_string());
        app.output.kv("retention", provisioner.retention().as_str());
    }
    Ok(ExitCode::SUCCESS)
}
