//! HTTP client for the backend: credential issuance and status reports.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use burrow_common::{TokenResponse, TunnelStatus};
use tracing::debug;

use crate::application::ports::{CredentialSource, StatusSink};
use crate::domain::{Credential, CredentialError};

/// Request timeout for all backend HTTP calls.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body kept in [`CredentialError::Status`].
const MAX_ERROR_BODY: usize = 256;

/// Thin client over the backend's REST endpoints. Cheap to clone.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("cannot build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The command stream endpoint for this backend.
    #[must_use]
    pub fn stream_url(&self) -> String {
        to_stream_url(&self.base_url)
    }

    /// `GET {base}/api/token`.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] for transport failures, non-2xx
    /// responses, undecodable bodies and empty tokens.
    pub async fn fetch_credential(&self) -> Result<Credential, CredentialError> {
        let url = format!("{}/api/token", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| CredentialError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(CredentialError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| CredentialError::Decode(e.to_string()))?;
        if token.token.trim().is_empty() {
            return Err(CredentialError::EmptyToken);
        }
        let credential = Credential::from(token);
        debug!(token = %credential.preview(), expires_at = ?credential.expires_at(), "credential issued");
        Ok(credential)
    }

    /// `POST {base}/api/status` with the status as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-2xx response.
    pub async fn post_status(&self, status: &TunnelStatus) -> Result<()> {
        let url = format!("{}/api/status", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(status)
            .send()
            .await
            .with_context(|| format!("cannot reach {url}"))?;
        let code = resp.status();
        anyhow::ensure!(code.is_success(), "backend returned status {code}");
        Ok(())
    }
}

impl CredentialSource for BackendClient {
    async fn fetch_credential(&self) -> Result<Credential, CredentialError> {
        BackendClient::fetch_credential(self).await
    }
}

#[async_trait]
impl StatusSink for BackendClient {
    async fn report_status(&self, status: &TunnelStatus) -> Result<()> {
        self.post_status(status).await
    }
}

/// Swap the HTTP scheme for its WebSocket equivalent and append the command
/// path: `https://api.example.com` becomes `wss://api.example.com/api/commands`.
#[must_use]
pub fn to_stream_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws}/api/commands")
}
