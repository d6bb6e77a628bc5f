//! Remote-fetch strategy: downloads the agent from its GitHub releases.

use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::info;

use crate::application::ports::BinarySource;
use crate::domain::platform::ARCHIVE_MEMBER;
use crate::domain::{Platform, ProvisionError};
use crate::infra::archive::{extract_member, write_atomically};

/// Latest-release endpoint of the agent's repository.
pub const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/cloudflare/cloudflared/releases/latest";

/// Base of the per-tag asset download URLs.
pub const DOWNLOAD_BASE_URL: &str = "https://github.com/cloudflare/cloudflared/releases/download";

/// Upper bound on a downloaded asset.
const MAX_ASSET_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

/// Fetches the latest agent release for a platform over HTTPS.
pub struct GithubReleaseSource {
    agent: ureq::Agent,
    latest_url: String,
    download_base: String,
    max_asset_bytes: u64,
}

impl Default for GithubReleaseSource {
    fn default() -> Self {
        Self::new()
    }
}

impl GithubReleaseSource {
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoints(LATEST_RELEASE_URL, DOWNLOAD_BASE_URL)
    }

    /// Point the source at alternative endpoints, e.g. a mirror.
    #[must_use]
    pub fn with_endpoints(latest_url: impl Into<String>, download_base: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("burrow/", env!("CARGO_PKG_VERSION")))
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(120))
            .build();
        Self {
            agent,
            latest_url: latest_url.into(),
            download_base: download_base.into().trim_end_matches('/').to_string(),
            max_asset_bytes: MAX_ASSET_BYTES,
        }
    }

    /// Override the largest asset the source will accept.
    #[must_use]
    pub fn with_max_asset_bytes(mut self, limit: u64) -> Self {
        self.max_asset_bytes = limit;
        self
    }

    /// Tag name of the latest published release, e.g. `2024.6.1`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Network`] if the index cannot be queried or
    /// decoded.
    pub fn latest_tag(&self) -> Result<String, ProvisionError> {
        let body = self
            .agent
            .get(&self.latest_url)
            .set("Accept", "application/vnd.github+json")
            .call()
            .map_err(|e| ProvisionError::Network(format!("querying latest release: {e}")))?
            .into_string()
            .map_err(|e| ProvisionError::Network(format!("reading latest release: {e}")))?;
        let release: LatestRelease = serde_json::from_str(&body)
            .map_err(|e| ProvisionError::Network(format!("decoding latest release: {e}")))?;
        Ok(release.tag_name)
    }

    #[must_use]
    pub fn asset_url(&self, tag: &str, platform: Platform) -> String {
        format!("{}/{tag}/{}", self.download_base, platform.asset_name())
    }

    fn download(&self, url: &str) -> Result<Vec<u8>, ProvisionError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| ProvisionError::Network(format!("downloading {url}: {e}")))?;
        let limit = self.max_asset_bytes;
        if let Some(declared) = response
            .header("Content-Length")
            .and_then(|v| v.trim().parse::<u64>().ok())
            && declared > limit
        {
            return Err(ProvisionError::Network(format!(
                "asset {url} declares {declared} bytes, exceeds limit of {limit}"
            )));
        }

        // One byte past the limit tells an oversized body apart from an exact fit.
        let mut data = Vec::new();
        response
            .into_reader()
            .take(limit.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(|e| ProvisionError::Network(format!("reading {url}: {e}")))?;
        if u64::try_from(data.len()).unwrap_or(u64::MAX) > limit {
            return Err(ProvisionError::Network(format!(
                "asset {url} exceeds limit of {limit} bytes"
            )));
        }
        Ok(data)
    }
}

impl BinarySource for GithubReleaseSource {
    fn fetch(&self, platform: Platform, dest: &Path) -> Result<(), ProvisionError> {
        let tag = self.latest_tag()?;
        let url = self.asset_url(&tag, platform);
        info!(%tag, %url, "downloading tunnel agent");
        let data = self.download(&url)?;

        write_atomically(dest, |file| {
            if platform.is_archive() {
                extract_member(
                    Cursor::new(&data),
                    ARCHIVE_MEMBER,
                    &platform.asset_name(),
                    file,
                )
            } else {
                file.write_all(&data)
                    .map_err(|e| ProvisionError::io("writing agent binary", e))
            }
        })
    }

    fn describe(&self) -> String {
        format!("remote fetch ({})", self.latest_url)
    }
}
