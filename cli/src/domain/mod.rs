//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod credential;
pub mod error;
pub mod ingress;
pub mod log_ring;
pub mod platform;

pub use config::{BurrowConfig, RetentionPolicy, RouteChange};
pub use credential::Credential;
pub use error::{
    BinaryDefect, CommandError, ConfigError, CredentialError, ProvisionError, StreamError,
    SupervisorError, TunnelError,
};
pub use ingress::IngressDocument;
pub use log_ring::LogRing;
pub use platform::Platform;
