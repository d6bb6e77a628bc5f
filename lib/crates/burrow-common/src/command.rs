//! Commands pushed by the backend over the control channel.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A command as it arrives on the wire: `{"type": "...", "payload": {...}}`.
///
/// `kind` is kept as a raw string so that envelopes with kinds this build does
/// not know about still decode and can be logged before being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl CommandEnvelope {
    /// Build an envelope with an empty payload.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: Map::new(),
        }
    }

    /// Resolve the raw kind against the known command set.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownCommandKind`] when the kind is not one of
    /// [`CommandKind::ALL`].
    pub fn command_kind(&self) -> Result<CommandKind, UnknownCommandKind> {
        self.kind.parse()
    }
}

/// The fixed set of commands the backend may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    Update,
    Restart,
    Patch,
}

impl CommandKind {
    pub const ALL: [CommandKind; 3] = [CommandKind::Update, CommandKind::Restart, CommandKind::Patch];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Update => "update",
            CommandKind::Restart => "restart",
            CommandKind::Patch => "patch",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a command kind string is not part of [`CommandKind::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown command kind '{0}'")]
pub struct UnknownCommandKind(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommandKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownCommandKind(s.to_string()))
    }
}
