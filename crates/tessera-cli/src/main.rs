//! Tessera CLI - run distributed key generation from the command line
//!
//! Every party runs in-process as its own task; the command prints the
//! agreed group key and can write each party's key package to disk.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Threshold Schnorr distributed key generation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a DKG and print the group key
    Keygen {
        #[command(flatten)]
        dkg: DkgArgs,

        /// Directory to write one key package per party
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a DKG, then sign a message with a quorum of the new shares
    Sign {
        #[command(flatten)]
        dkg: DkgArgs,

        /// Message to sign (UTF-8)
        #[arg(short, long)]
        message: String,

        /// Signing parties, comma separated (default: 1..=threshold+1)
        #[arg(long, value_delimiter = ',')]
        signers: Vec<u16>,
    },

    /// Configuration file commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write a configuration file with default settings
    Init {
        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of parties
        #[arg(short = 'n', long, default_value_t = 3)]
        parties: u16,

        /// Polynomial degree; signing needs threshold + 1 parties
        #[arg(short, long, default_value_t = 1)]
        threshold: u16,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Curve and hash suite
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Suite {
    Ed25519,
    Secp256k1,
    /// secp256k1 with BIP-340 signatures under the BIP-341 key-path output key
    Taproot,
}

#[derive(Args, Debug)]
pub struct DkgArgs {
    /// Number of parties (overrides the config file)
    #[arg(short = 'n', long)]
    pub parties: Option<u16>,

    /// Polynomial degree (overrides the config file)
    #[arg(short, long)]
    pub threshold: Option<u16>,

    /// Curve suite
    #[arg(long, value_enum, default_value_t = Suite::Ed25519)]
    pub suite: Suite,

    /// 32-byte hex seed for a reproducible run
    #[arg(long)]
    pub seed: Option<String>,

    /// Per-round barrier timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Stop a party at its first failed check instead of recording it
    #[arg(long)]
    pub abort_on_failure: bool,

    /// Configuration file
    #[arg(short, long, env = "TESSERA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tessera=info,tessera_dkg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { dkg, output } => commands::keygen(dkg, output).await,
        Commands::Sign {
            dkg,
            message,
            signers,
        } => commands::sign(dkg, message, signers).await,
        Commands::Config(ConfigCommands::Init {
            output,
            parties,
            threshold,
            force,
        }) => commands::config_init(&output, parties, threshold, force),
    }
}
