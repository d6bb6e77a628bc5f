//! Command implementations

pub mod config;
pub mod provision;
pub mod routes;
pub mod run;
pub mod status;
pub mod token;
pub mod version;
