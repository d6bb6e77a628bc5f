//! burrow - expose local services through a supervised tunnel agent

use std::process::ExitCode;

use burrow_cli::cli::Cli;
use burrow_cli::output::json;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let as_json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            let message = format!("{e:#}");
            match json::format_error(&message) {
                Ok(obj) if as_json => println!("{obj}"),
                _ => eprintln!("Error: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr, filtered by `RUST_LOG` or the `--verbose` default.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "burrow_cli=debug,burrow=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}
