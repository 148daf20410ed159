use std::io::{stderr, stdout};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dm_cli::commands::{convert, inspect};
use dm_cli::{Cli, Commands, Config};

/// Load config from default locations plus an optional explicit file.
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays pipeable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(stderr)
        .try_init();

    match &cli.command {
        Some(Commands::Convert(args)) => {
            let config = load_config(cli.config.as_deref())?;
            convert::run(&mut stdout().lock(), args, &config)?;
        }
        Some(Commands::Inspect(args)) => {
            inspect::run(&mut stdout().lock(), args)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
