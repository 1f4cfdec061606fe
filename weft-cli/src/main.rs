//! # weft CLI
//!
//! Command-line interface for composing and checking weft gateway schemas.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "weft")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "weft.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose the contract document from a registry manifest
    Compose {
        /// Registry manifest (YAML, or JSON with a .json extension)
        #[arg(long, env = "WEFT_REGISTRY")]
        registry: PathBuf,

        /// Also write the document to this file
        #[arg(long)]
        out: Option<PathBuf>,

        /// Emit JSON with the document and bound resolvers
        #[arg(long)]
        json: bool,
    },

    /// Compile the registry and report whether the contract is accepted
    Check {
        /// Registry manifest (YAML, or JSON with a .json extension)
        #[arg(long, env = "WEFT_REGISTRY")]
        registry: PathBuf,
    },

    /// Publish one event to a subscription field and print what it resolves to
    Emit {
        /// Registry manifest (YAML, or JSON with a .json extension)
        #[arg(long, env = "WEFT_REGISTRY")]
        registry: PathBuf,

        /// Tag to publish under
        #[arg(long)]
        tag: String,

        /// Event payload as JSON
        #[arg(long, default_value = "null")]
        payload: String,

        /// Subscription field to listen on
        #[arg(long)]
        field: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::WARN.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Compose {
            registry,
            out,
            json,
        } => commands::compose_schema(&cli.config, &registry, out.as_deref(), json).await,
        Commands::Check { registry } => commands::check_schema(&cli.config, &registry).await,
        Commands::Emit {
            registry,
            tag,
            payload,
            field,
        } => {
            let opts = commands::EmitOptions { tag, payload, field };
            commands::emit_event(&cli.config, &registry, opts).await
        }
    }
}
