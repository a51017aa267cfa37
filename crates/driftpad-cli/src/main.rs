//! driftpad CLI
//!
//! Command-line front end for driftpad - a local-first text pad.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use driftpad_core::{Config, DocumentId};

mod backend;
mod commands;
mod output;

use backend::Backend;
use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "driftpad")]
#[command(about = "driftpad - a text pad that keeps working offline")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use this config file instead of the default
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Use an in-process remote store (demo mode)
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new document
    New,
    /// Show a document and its sync state
    Show {
        /// Document ID
        id: String,
    },
    /// Replace a document's content and save it
    Write {
        /// Document ID
        id: String,
        /// New content
        text: String,
    },
    /// Edit a document line by line from stdin
    Edit {
        /// Document ID
        id: String,
    },
    /// List documents in the local cache
    #[command(alias = "ls")]
    List,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, remote_url, debounce_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));
    let config_path = cli.config.as_ref();

    // Config commands work without a loadable configuration
    if let Commands::Config { command } = &cli.command {
        return handle_config_command(command.clone(), config_path, &output);
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    if let Commands::List = cli.command {
        return commands::list::list(&config, &output);
    }

    let backend = Backend::from_config(&config, cli.memory)?;

    let result = match cli.command {
        Commands::New => commands::new::create(&backend, &output).await,
        Commands::Show { id } => commands::show::show(&backend, parse_id(&id)?, &output).await,
        Commands::Write { id, text } => {
            commands::write::write(&backend, parse_id(&id)?, text, &output).await
        }
        Commands::Edit { id } => commands::edit::edit(&backend, parse_id(&id)?, &output).await,
        Commands::List | Commands::Config { .. } => unreachable!(), // Handled above
    };

    backend.shutdown();
    result
}

fn parse_id(id: &str) -> Result<DocumentId> {
    DocumentId::parse(id).with_context(|| format!("Invalid document ID '{}'", id))
}

fn handle_config_command(
    command: Option<ConfigCommands>,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
        Some(ConfigCommands::Set { key, value }) => {
            commands::config::set(key, value, config_path, output)
        }
    }
}

/// Initialize logging
///
/// Only initializes if the DRIFTPAD_LOG environment variable is set.
/// Logs to `config.log_file` when configured, stderr otherwise.
fn init_logging(config: &Config) {
    // Only log if DRIFTPAD_LOG is set
    let Ok(log_level) = std::env::var("DRIFTPAD_LOG") else {
        return;
    };

    let env_filter = EnvFilter::new(format!(
        "driftpad_core={},driftpad_cli={}",
        log_level, log_level
    ));

    match &config.log_file {
        Some(log_path) => {
            let log_file = match File::create(log_path) {
                Ok(f) => f,
                Err(e) => {
                    eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
                    return;
                }
            };

            // Ignore error if already initialized
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(log_file)
                .try_init();

            info!("Logging initialized to {:?}", log_path);
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
