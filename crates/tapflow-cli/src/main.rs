//! tapflow CLI entry point.
//!
//! Binary name: `tapflow`
//!
//! Parses CLI arguments, loads configuration, then dispatches to the
//! appropriate command handler.

mod cli;
mod config;

use clap::Parser;
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,tapflow=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();

    // Shell completions don't need configuration
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tapflow", &mut std::io::stdout());
        return Ok(());
    }

    let config = config::load(cli.config.as_deref());

    let exit = match cli.command {
        Commands::Run { script, mode, debug } => {
            cli::run::run(&config, script.as_deref(), mode, debug, cli.json).await?
        }

        Commands::List => cli::list::list_scripts(&config, cli.json)?,

        Commands::Validate { script } => cli::validate::validate(&config, &script, cli.json)?,

        Commands::Completions { .. } => unreachable!("handled above"),
    };

    if exit != 0 {
        std::process::exit(exit);
    }
    Ok(())
}
