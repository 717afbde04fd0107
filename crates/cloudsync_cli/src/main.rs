//! CloudSync CLI
//!
//! Command-line tools for working with encrypted sync envelopes offline.
//!
//! # Commands
//!
//! - `inspect` - Display envelope metadata and validate its structure
//! - `verify` - Decrypt an envelope and summarize the bundle inside
//! - `decrypt` - Write the decrypted bundle JSON
//! - `encrypt` - Seal a bundle JSON file into a new envelope

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CloudSync envelope tools.
#[derive(Parser)]
#[command(name = "cloudsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display envelope metadata without decrypting
    Inspect {
        /// Envelope JSON file
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decrypt an envelope and check the bundle inside
    Verify {
        /// Envelope JSON file
        file: PathBuf,
    },

    /// Decrypt an envelope and print or write the bundle
    Decrypt {
        /// Envelope JSON file
        file: PathBuf,

        /// Write the bundle here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Seal a bundle JSON file into a new envelope
    Encrypt {
        /// Bundle JSON file
        bundle: PathBuf,

        /// Where to write the envelope
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { file, format } => {
            commands::inspect::run(&file, &format)?;
        }
        Commands::Verify { file } => {
            let passphrase = commands::passphrase::read()?;
            commands::verify::run(&file, &passphrase)?;
        }
        Commands::Decrypt { file, output } => {
            let passphrase = commands::passphrase::read()?;
            commands::decrypt::run(&file, &passphrase, output.as_deref())?;
        }
        Commands::Encrypt { bundle, output } => {
            let passphrase = commands::passphrase::read()?;
            commands::encrypt::run(&bundle, &passphrase, &output)?;
        }
        Commands::Version => {
            println!("CloudSync CLI v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "Envelope schema v{} ({})",
                cloudsync_protocol::SCHEMA_VERSION,
                cloudsync_protocol::KDF_ARGON2ID
            );
        }
    }

    Ok(())
}
