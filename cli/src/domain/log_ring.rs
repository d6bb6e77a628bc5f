//! Bounded ring of agent output lines and public-URL extraction.
//!
//! Pure data structure with no I/O or locking. The supervisor owns one ring per
//! run and guards it with its own lock.

use std::collections::VecDeque;

/// Number of agent output lines kept per run.
pub const LOG_CAPACITY: usize = 100;

/// Scheme marker a public URL must start with.
const SECURE_SCHEME: &str = "https://";

/// Relay domains that identify a line as carrying the tunnel's public URL.
const RELAY_DOMAINS: &[&str] = &["trycloudflare.com", "cloudflare.com"];

/// FIFO ring of the most recent output lines; pushing past capacity evicts
/// the oldest line.
#[derive(Debug, Clone)]
pub struct LogRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(LOG_CAPACITY)
    }
}

impl LogRing {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Copy of the ring, oldest line first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// First public URL found in the ring, scanning oldest to newest.
    #[must_use]
    pub fn tunnel_url(&self) -> Option<String> {
        self.iter().find_map(extract_tunnel_url)
    }
}

/// Extract a public tunnel URL from a single agent output line.
///
/// The line must contain `https://` and one of the relay domains. The URL runs
/// from the scheme marker to the next whitespace (or end of line) and must
/// contain at least one `.`.
#[must_use]
pub fn extract_tunnel_url(line: &str) -> Option<String> {
    let start = line.find(SECURE_SCHEME)?;
    if !RELAY_DOMAINS.iter().any(|domain| line.contains(domain)) {
        return None;
    }
    let rest = &line[start..];
    let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
    let url = &rest[..end];
    url.contains('.').then(|| url.to_string())
}
