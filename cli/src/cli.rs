//! CLI argument parsing with clap derive

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, OutputFlags};
use crate::commands;

/// Expose local services through a supervised tunnel agent
#[derive(Parser)]
#[command(
    name = "burrow",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Enable debug logging (overridden by `RUST_LOG`)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the tunnel and supervise it until Ctrl-C
    Run(commands::run::RunArgs),

    /// Show the status of a running tunnel
    Status,

    /// Download or verify the tunnel agent binary
    Provision,

    /// Fetch a tunnel token from the backend
    Token,

    /// Manage hostname routes
    #[command(subcommand)]
    Routes(commands::routes::RoutesCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            command,
            ..
        } = self;
        if let Command::Version = command {
            return Ok(commands::version::run(json));
        }

        let app = AppContext::new(&OutputFlags {
            no_color,
            quiet,
            json,
        })?;
        match command {
            Command::Run(args) => commands::run::run(&app, args).await,
            Command::Status => commands::status::run(&app).await,
            Command::Provision => commands::provision::run(&app).await,
            Command::Token => commands::token::run(&app).await,
            Command::Routes(cmd) => commands::routes::run(&app, cmd),
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => Ok(commands::version::run(json)),
        }
    }
}
