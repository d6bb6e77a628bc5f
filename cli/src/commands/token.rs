//! `burrow token`: fetch a credential from the backend and show its preview.

use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::json;

use crate::app::{AppContext, build_backend};
use crate::output::json;

/// Run the token command. The full token is never printed.
///
/// # Errors
///
/// Returns an error if the backend does not issue a credential.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    let client = build_backend(&config)?;
    let credential = client
        .fetch_credential()
        .await
        .with_context(|| format!("failed to get token from {}", client.base_url()))?;

    let expires = credential
        .expires_at()
        .map(|t| t.to_rfc3339());
    if app.is_json() {
        json::print(&json!({
            "preview": credential.preview(),
            "expiresAt": expires,
        }))?;
    } else {
        app.output.success("Token issued");
        app.output.kv("token", &credential.preview());
        app.output
            .kv("expires", expires.as_deref().unwrap_or("never"));
    }
    Ok(ExitCode::SUCCESS)
}
