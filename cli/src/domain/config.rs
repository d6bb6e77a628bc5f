//! Domain types and validators for burrow configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use anyhow::Result;
use burrow_common::RouteMapping;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "backend_url",
    "tunnel_name",
    "web_server_port",
    "refresh_interval_secs",
    "retention",
];
pub const VALID_RETENTION_POLICIES: &[&str] = &["cached", "ephemeral"];

pub const DEFAULT_BACKEND_URL: &str = "https://api.example.com";
pub const DEFAULT_TUNNEL_NAME: &str = "my-tunnel";
pub const DEFAULT_WEB_SERVER_PORT: u16 = 8080;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Refresh intervals outside this window are rejected by `config set`.
const REFRESH_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=86_400;

// ── Config schema ────────────────────────────────────────────────────────────

/// What happens to the provisioned agent binary once a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Keep the binary across runs; delete only at application teardown.
    #[default]
    Cached,
    /// Delete the binary after every run.
    Ephemeral,
}

impl RetentionPolicy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cached => "cached",
            Self::Ephemeral => "ephemeral",
        }
    }
}

impl std::str::FromStr for RetentionPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cached" => Ok(Self::Cached),
            "ephemeral" => Ok(Self::Ephemeral),
            other => Err(ConfigError::InvalidValue {
                key: "retention".to_string(),
                value: other.to_string(),
                valid: VALID_RETENTION_POLICIES.join(", "),
            }),
        }
    }
}

/// Top-level configuration stored in `<config dir>/burrow/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BurrowConfig {
    /// Backend base address; `http` or `https`.
    pub backend_url: String,
    pub tunnel_name: String,
    /// Port of the local companion server started alongside the tunnel.
    pub web_server_port: u16,
    pub refresh_interval_secs: u64,
    pub retention: RetentionPolicy,
    /// Hostname routes exposed through the tunnel; unique by hostname.
    pub routes: Vec<RouteMapping>,
}

impl Default for BurrowConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            tunnel_name: DEFAULT_TUNNEL_NAME.to_string(),
            web_server_port: DEFAULT_WEB_SERVER_PORT,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            retention: RetentionPolicy::default(),
            routes: Vec::new(),
        }
    }
}

/// Outcome of [`BurrowConfig::upsert_route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteChange {
    Added,
    Updated,
}

impl BurrowConfig {
    /// Insert a route, replacing the service of an existing route with the
    /// same hostname.
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname or service is malformed.
    pub fn upsert_route(&mut self, route: RouteMapping) -> Result<RouteChange, ConfigError> {
        validate_route(&route)?;
        if let Some(existing) = self
            .routes
            .iter_mut()
            .find(|r| r.hostname == route.hostname)
        {
            existing.service = route.service;
            return Ok(RouteChange::Updated);
        }
        self.routes.push(route);
        Ok(RouteChange::Added)
    }

    /// Remove the route for `hostname`. Returns `false` if none existed.
    pub fn remove_route(&mut self, hostname: &str) -> bool {
        let before = self.routes.len();
        self.routes.retain(|r| r.hostname != hostname);
        self.routes.len() != before
    }

    /// Apply a validated `config set` assignment.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "backend_url" => self.backend_url = value.trim_end_matches('/').to_string(),
            "tunnel_name" => self.tunnel_name = value.to_string(),
            "web_server_port" => self.web_server_port = value.parse()?,
            "refresh_interval_secs" => self.refresh_interval_secs = value.parse()?,
            "retention" => self.retention = value.parse()?,
            _ => {}
        }
        Ok(())
    }

    /// Current value of a settable key, rendered as text.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<String> {
        Some(match key {
            "backend_url" => self.backend_url.clone(),
            "tunnel_name" => self.tunnel_name.clone(),
            "web_server_port" => self.web_server_port.to_string(),
            "refresh_interval_secs" => self.refresh_interval_secs.to_string(),
            "retention" => self.retention.as_str().to_string(),
            _ => return None,
        })
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |valid: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: valid.to_string(),
    };
    match key {
        "backend_url" => {
            let rest = value
                .strip_prefix("https://")
                .or_else(|| value.strip_prefix("http://"));
            if rest.is_none_or(str::is_empty) {
                return Err(invalid("an http:// or https:// URL").into());
            }
        }
        "tunnel_name" => {
            if value.trim().is_empty() {
                return Err(invalid("a non-empty name").into());
            }
        }
        "web_server_port" => {
            if !matches!(value.parse::<u16>(), Ok(port) if port > 0) {
                return Err(invalid("1-65535").into());
            }
        }
        "refresh_interval_secs" => {
            if !matches!(value.parse::<u64>(), Ok(secs) if REFRESH_INTERVAL_RANGE.contains(&secs)) {
                return Err(invalid(&format!(
                    "{}-{}",
                    REFRESH_INTERVAL_RANGE.start(),
                    REFRESH_INTERVAL_RANGE.end()
                ))
                .into());
            }
        }
        "retention" => {
            if !VALID_RETENTION_POLICIES.contains(&value) {
                return Err(invalid(&VALID_RETENTION_POLICIES.join(", ")).into());
            }
        }
        _ => {}
    }
    Ok(())
}

/// Validates a single route mapping.
///
/// # Errors
///
/// Returns an error if the hostname is empty or contains whitespace or a
/// scheme, or if the service is empty.
pub fn validate_route(route: &RouteMapping) -> Result<(), ConfigError> {
    let host = route.hostname.as_str();
    if host.is_empty() || host.chars().any(char::is_whitespace) || host.contains("://") {
        return Err(ConfigError::InvalidRoute(format!(
            "hostname '{host}' must be a bare host name such as app.example.com"
        )));
    }
    if route.service.trim().is_empty() {
        return Err(ConfigError::InvalidRoute(format!(
            "service for '{host}' must not be empty"
        )));
    }
    Ok(())
}

// ── Unit tests ───────────────────────────────────────────────────────────────
