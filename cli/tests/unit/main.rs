//! Unit tests for the burrow CLI
//!
//! These tests drive the application services with test doubles and local
//! loopback servers; no network access beyond 127.0.0.1 is needed.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod control_channel;
#[cfg(unix)]
mod orchestrator;
