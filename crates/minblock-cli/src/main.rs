//! minblock CLI
//!
//! Builds the asset blocks of an HTML document.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// minblock - bundle and minify the build blocks of an HTML document
#[derive(Parser)]
#[command(name = "minblock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (default: ./minblock.yaml if present)
    #[arg(short, long, env = "MINBLOCK_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every build block and rewrite the document
    Build {
        /// HTML document to process
        file: PathBuf,

        /// Base path of the assets (defaults to the document's directory)
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Write the rewritten document here instead of in place
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output token that inlines the compiled result
        #[arg(long)]
        inline_token: Option<String>,

        /// Delete source assets of compiled blocks
        #[arg(long)]
        remove_sources: bool,
    },

    /// List the build blocks of a document without compiling
    Check {
        /// HTML document to inspect
        file: PathBuf,

        /// Print the block listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a starter minblock.yaml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Build {
            file,
            base,
            output,
            inline_token,
            remove_sources,
        } => {
            let options = commands::build::BuildOptions {
                base,
                output,
                inline_token,
                remove_sources,
            };
            commands::build::run(cli.config.as_deref(), &file, options).await?;
        }
        Commands::Check { file, json } => {
            commands::check::run(cli.config.as_deref(), &file, json).await?;
        }
        Commands::Init { path } => {
            commands::init::run(&path).await?;
        }
    }

    Ok(())
}
