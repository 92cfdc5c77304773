//! Lode CLI
//!
//! Key tooling and a local devnet for the Lode governance contracts.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use lode_crypto::{KeyPair, PublicKey, ThresholdMode, VerificationScript};
use lode_node::config::LoggingConfig;
use lode_node::{devnet, init_logging, NodeConfig};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lode")]
#[command(version)]
#[command(about = "Lode - governance core for decentralized object storage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an Ed25519 keypair
    Keygen {
        /// 32-byte secret (hex) to derive the keypair from
        #[arg(long, env = "LODE_SECRET")]
        secret: Option<String>,

        /// Write the secret key (hex) to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Derive a multisignature address from public keys
    Multisig {
        /// Threshold policy
        #[arg(short, long, value_enum, default_value = "alphabet")]
        mode: Mode,

        /// Public keys (hex), in signing order
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Emit the default configuration as TOML
    Config {
        /// Output file, stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a scripted local network and print its final state
    Devnet {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the number of epochs to run
        #[arg(long)]
        epochs: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Alphabet,
    Committee,
}

impl From<Mode> for ThresholdMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Alphabet => ThresholdMode::Alphabet,
            Mode::Committee => ThresholdMode::Committee,
        }
    }
}

#[derive(Serialize)]
struct KeyOutput {
    public_key: String,
    address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,
}

#[derive(Serialize)]
struct MultisigOutput {
    address: String,
    threshold: usize,
    keys: usize,
    script: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen { secret, output } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            let keypair = match secret {
                Some(hex) => KeyPair::from_secret_hex(&hex)?,
                None => KeyPair::generate(),
            };
            let secret_hex = hex::encode(keypair.secret_bytes());
            let secret_key = match output {
                Some(path) => {
                    std::fs::write(&path, &secret_hex)
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(path = %path.display(), "secret key written");
                    None
                }
                None => Some(secret_hex),
            };
            print_json(&KeyOutput {
                public_key: keypair.public_key().to_hex(),
                address: keypair.address().to_hex(),
                secret_key,
            })?;
        }

        Commands::Multisig { mode, keys } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            let keys = keys
                .iter()
                .map(|k| PublicKey::from_hex(k).with_context(|| format!("bad public key {}", k)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let script = VerificationScript::multisig(&keys, mode.into());
            print_json(&MultisigOutput {
                address: script.address().to_hex(),
                threshold: script.threshold(),
                keys: keys.len(),
                script: hex::encode(script.to_bytes()),
            })?;
        }

        Commands::Config { output } => {
            init_logging(&LoggingConfig::default(), cli.verbose)?;
            let config = NodeConfig::default();
            match output {
                Some(path) => {
                    config.save(&path)?;
                    tracing::info!(path = %path.display(), "default config written");
                }
                None => print!("{}", config.to_toml()?),
            }
        }

        Commands::Devnet { config, epochs } => {
            let mut node_config = match &config {
                Some(path) => NodeConfig::load(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => NodeConfig::default(),
            };
            if let Some(epochs) = epochs {
                node_config.devnet.epochs = epochs;
            }
            init_logging(&node_config.logging, cli.verbose)?;

            tracing::info!(
                alphabet = node_config.devnet.alphabet_size,
                nodes = node_config.devnet.storage_nodes,
                epochs = node_config.devnet.epochs,
                "starting devnet"
            );
            let report = devnet::run(&node_config)?;
            print_json(&report)?;
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
