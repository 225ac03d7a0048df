use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

mod commands;
mod scene;

#[derive(Parser)]
#[command(name = "action-cli")]
#[command(about = "Mount async action controls from a scene file and drive them")]
#[command(version)]
struct Cli {
    /// Scene file path
    #[arg(short, long, global = true, default_value = "scene.yaml")]
    config: PathBuf,

    /// Log level (overrides the scene's settings.log_level)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the scene file
    Validate,

    /// List the controls defined in the scene
    List {
        /// Output format (table or json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Mount every control and read trigger commands from stdin
    Run,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = log_level(cli.log_level.as_deref(), &cli.config)?;
    tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Validate => commands::validate::run(&cli.config).await,
            Commands::List { format } => commands::list::run(&cli.config, &format).await,
            Commands::Run => commands::run::run(&cli.config).await,
        }
    })
}

/// Resolve the log level from the flag, then the scene settings
fn log_level(flag: Option<&str>, config: &Path) -> Result<Level> {
    let from_scene = || {
        action_config::parser::parse_file(config)
            .ok()
            .and_then(|scene| scene.settings.log_level)
    };

    match flag.map(str::to_string).or_else(from_scene) {
        Some(level) => {
            Level::from_str(&level).with_context(|| format!("Invalid log level: {}", level))
        }
        None => Ok(Level::INFO),
    }
}
