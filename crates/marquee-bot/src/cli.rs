//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use marquee_core::config::{self, paths};

#[derive(Parser)]
#[command(name = "marquee")]
#[command(version)]
#[command(about = "Chat assistant for requesting movies and TV shows")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the Telegram bot (long-polling); the default
    Run,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            marquee_bot::init_tracing();
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(marquee_bot::run())
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                println!("{}", paths::config_path().display());
                Ok(())
            }
            ConfigCommands::Init => {
                let config_path = paths::config_path();
                config::Config::init(&config_path)
                    .with_context(|| format!("init config at {}", config_path.display()))?;
                println!("Created config at {}", config_path.display());
                Ok(())
            }
        },
    }
}
