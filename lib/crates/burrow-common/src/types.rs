use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response body of `GET {backend}/api/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(rename = "expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A public hostname routed by the agent to a local service.
///
/// Route sets are keyed on `hostname`; `service` is the local address the
/// agent forwards to, e.g. `http://localhost:3000`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteMapping {
    pub hostname: String,
    pub service: String,
}

impl RouteMapping {
    #[must_use]
    pub fn new(hostname: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            service: service.into(),
        }
    }
}

/// Lifecycle phase of the supervised agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TunnelPhase {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Crashed,
}

impl TunnelPhase {
    /// `true` for phases in which no agent process is alive.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TunnelPhase::Idle | TunnelPhase::Crashed)
    }

    /// Wire name, as used in status payloads.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TunnelPhase::Idle => "idle",
            TunnelPhase::Starting => "starting",
            TunnelPhase::Running => "running",
            TunnelPhase::Stopping => "stopping",
            TunnelPhase::Crashed => "crashed",
        }
    }
}

/// Snapshot returned by status queries and reported to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TunnelStatus {
    pub running: bool,
    pub phase: TunnelPhase,
    pub tunnel_name: String,
    /// Best-effort public URL scraped from agent output; empty when unknown.
    #[serde(rename = "tunnelURL")]
    pub tunnel_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    pub logs: Vec<String>,
}
