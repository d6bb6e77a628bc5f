//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: agent binary provisioning,
//! process spawning, filesystem access, backend HTTP and WebSocket traffic,
//! and the local status server.
//!
//! Imports from `crate::domain` and `crate::application` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod archive;
pub mod backend;
pub mod bundled;
pub mod config;
pub mod control;
pub mod fs;
pub mod launcher;
pub mod provisioner;
pub mod release;
pub mod status_server;

/// Binary source selected by build configuration.
#[cfg(feature = "bundled-agent")]
pub type DefaultSource = bundled::BundledBinarySource;
/// Binary source selected by build configuration.
#[cfg(not(feature = "bundled-agent"))]
pub type DefaultSource = release::GithubReleaseSource;

/// Construct the build-selected binary source.
#[must_use]
pub fn default_source() -> DefaultSource {
    #[cfg(feature = "bundled-agent")]
    {
        bundled::BundledBinarySource::embedded()
    }
    #[cfg(not(feature = "bundled-agent"))]
    {
        release::GithubReleaseSource::new()
    }
}
