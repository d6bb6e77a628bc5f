//! `burrow routes`: manage hostname routes and preview the ingress file.

use std::process::ExitCode;

use anyhow::{Context, Result};
use burrow_common::RouteMapping;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::domain::{IngressDocument, RouteChange};
use crate::output::json;

/// Routes subcommands.
#[derive(Subcommand)]
pub enum RoutesCommand {
    /// List configured routes
    List,
    /// Add a route, or change the service of an existing hostname
    Add {
        /// Public hostname, e.g. app.example.com
        hostname: String,
        /// Local service, e.g. http://localhost:3000
        service: String,
    },
    /// Remove the route for a hostname
    Remove {
        /// Public hostname
        hostname: String,
    },
    /// Print the ingress file the agent would receive
    Render,
}

/// Run the routes command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or saved, or if the route
/// is invalid.
pub fn run(app: &AppContext, cmd: RoutesCommand) -> Result<ExitCode> {
    let mut config = app.load_config()?;
    match cmd {
        RoutesCommand::List => {
            if app.is_json() {
                json::print(&config.routes)?;
            } else if config.routes.is_empty() {
                app.output.info("No routes configured (token-only mode)");
            } else {
                for route in &config.routes {
                    app.output.route(route);
                }
            }
        }
        RoutesCommand::Add { hostname, service } => {
            let change = config.upsert_route(RouteMapping::new(&hostname, &service))?;
            app.config_store.save(&config)?;
            let verb = match change {
                RouteChange::Added => "Added",
                RouteChange::Updated => "Updated",
            };
            app.output.success(&format!("{verb} {hostname} -> {service}"));
        }
        RoutesCommand::Remove { hostname } => {
            if !config.remove_route(&hostname) {
                anyhow::bail!("no route for {hostname}");
            }
            app.config_store.save(&config)?;
            app.output.success(&format!("Removed {hostname}"));
        }
        RoutesCommand::Render => {
            let yaml = IngressDocument::from_routes(&config.routes)
                .to_yaml()
                .context("cannot render ingress config")?;
            print!("{yaml}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
