//! inklink CLI: the main entry point.
//!
//! Commands:
//! - `build`   : Assemble the context for a working document
//! - `context` : List or edit a conversation's context documents
//! - `links`   : Show a document's outgoing links and backlinks
//! - `config`  : Show, validate, or initialize configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "inklink",
    about = "inklink — multi-document AI context assembly for markdown notes",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Vault directory (overrides config and INKLINK_VAULT)
    #[arg(long, global = true)]
    vault: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble and print the context for a working document
    Build {
        /// Working document (id or name)
        #[arg(short, long)]
        file: String,

        /// Chat message; `[[references]]` in it are added to the context
        #[arg(short, long, default_value = "")]
        message: String,

        /// Print the assembled state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage a conversation's context documents
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Show outgoing links and backlinks of a document
    Links {
        #[arg(short, long)]
        file: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// List context documents
    List {
        #[arg(short, long)]
        file: String,
    },
    /// Add a context document
    Add {
        #[arg(short, long)]
        file: String,
        /// Document to add (id or name)
        document: String,
    },
    /// Remove a context document
    Remove {
        #[arg(short, long)]
        file: String,
        /// Document to remove (id or name)
        document: String,
    },
    /// Remove every context document
    Clear {
        #[arg(short, long)]
        file: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let vault = cli.vault;
    match cli.command {
        Commands::Build {
            file,
            message,
            json,
        } => commands::build::run(vault, &file, &message, json).await?,
        Commands::Context { action } => match action {
            ContextAction::List { file } => commands::context::list(vault, &file).await?,
            ContextAction::Add { file, document } => {
                commands::context::add(vault, &file, &document).await?
            }
            ContextAction::Remove { file, document } => {
                commands::context::remove(vault, &file, &document).await?
            }
            ContextAction::Clear { file } => commands::context::clear(vault, &file).await?,
        },
        Commands::Links { file } => commands::links::run(vault, &file).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Init { force } => commands::config_cmd::init(force).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
        },
    }

    Ok(())
}
