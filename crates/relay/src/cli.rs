use std::error::Error;

use clap::{Parser, Subcommand};
use shared::error::CommonError;

use crate::commands;
use crate::config::ServeParams;

pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Keeps Box collaboration groups in sync with Slack channel membership
#[derive(Parser)]
#[command(name = "relay", version = CLI_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the webhook server
    Serve(ServeParams),
    /// Print the OpenAPI document of the webhook endpoint
    Openapi,
    /// Show relay version
    Version,
}

fn log_error_chain(err: &dyn Error) {
    let mut current = err.source();

    while let Some(e) = current {
        eprintln!("Caused by: {e}");
        current = e.source();
    }
}

fn handle_error(err: &CommonError) -> ! {
    eprintln!("Error: {err}");
    log_error_chain(err);
    ::std::process::exit(1);
}

pub async fn run_cli(cli: Cli) -> Result<(), anyhow::Error> {
    let cmd_res = match cli.command {
        Commands::Serve(params) => commands::serve::cmd_serve(params).await,
        Commands::Openapi => commands::openapi::cmd_openapi(),
        Commands::Version => {
            println!("relay version: {CLI_VERSION}");
            Ok(())
        }
    };

    if let Err(e) = cmd_res {
        handle_error(&e);
    }
    Ok(())
}
