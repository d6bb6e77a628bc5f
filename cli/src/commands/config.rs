//! `burrow config`: show and set configuration values.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::domain::config::VALID_CONFIG_KEYS;
use crate::output::json;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or saved, or if the key
/// or value is invalid.
pub fn run(app: &AppContext, cmd: ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show_config(app),
        ConfigCommand::Path => {
            println!("{}", app.config_store.path().display());
            Ok(ExitCode::SUCCESS)
        }
        ConfigCommand::Set { key, value } => set_config(app, &key, &value),
    }
}

fn show_config(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    if app.is_json() {
        json::print(&config)?;
        return Ok(ExitCode::SUCCESS);
    }

    app.output.header("Configuration");
    for key in VALID_CONFIG_KEYS {
        app.output
            .kv(key, &config.setting(key).unwrap_or_default());
    }
    app.output.kv("routes", &config.routes.len().to_string());
    app.output
        .kv("file", &app.config_store.path().display().to_string());
    Ok(ExitCode::SUCCESS)
}

fn set_config(app: &AppContext, key: &str, value: &str) -> Result<ExitCode> {
    let mut config = app.load_config()?;
    config.apply_setting(key, value)?;
    app.config_store.save(&config)?;

    let stored = config.setting(key).unwrap_or_default();
    app.output.success(&format!("Set {key} = {stored}"));
    Ok(ExitCode::SUCCESS)
}
