//! Bearer credential handed to the agent for one run.

use std::fmt;

use burrow_common::TokenResponse;
use chrono::{DateTime, Utc};

/// Characters of the token that may appear in logs.
const PREVIEW_LEN: usize = 10;

/// Opaque bearer token plus optional expiry. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// A token supplied by the operator; carries no expiry.
    #[must_use]
    pub fn manual(token: impl Into<String>) -> Self {
        Self::new(token, None)
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Log-safe prefix of the token, e.g. `eyJhIjoiNm...`.
    #[must_use]
    pub fn preview(&self) -> String {
        let head: String = self.token.chars().take(PREVIEW_LEN).collect();
        format!("{head}...")
    }
}

impl From<TokenResponse> for Credential {
    fn from(resp: TokenResponse) -> Self {
        Self::new(resp.token, resp.expires_at)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &self.preview())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
