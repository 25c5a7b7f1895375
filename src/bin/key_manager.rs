//! Key Management CLI Tool
//!
//! Generates and inspects secp256k1 keys used to sign audit entries

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use compliance_audit::crypto::IntegritySigner;
use rand::rngs::OsRng;
use secp256k1::SecretKey;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "key-manager")]
#[command(about = "Compliance audit signing key tool")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing key
    Generate {
        /// Write the hex secret key to this file
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Print the public key for a signing key file
    PublicKey {
        /// Hex secret key file
        #[arg(short, long)]
        key: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output, force } => {
            if output.exists() && !force {
                return Err(anyhow!(
                    "Key file {} already exists (use --force to overwrite)",
                    output.display()
                ));
            }

            let secret_key = SecretKey::new(&mut OsRng);
            std::fs::write(&output, hex::encode(secret_key.secret_bytes()))
                .with_context(|| format!("Failed to write key file {}", output.display()))?;

            let signer = IntegritySigner::new(secret_key);
            println!("Signing key written to {}", output.display());
            println!(
                "Public key: {}",
                signer.public_key_hex().unwrap_or_default()
            );
        }
        Commands::PublicKey { key } => {
            let signer = IntegritySigner::from_key_file(&key)?;
            println!("{}", signer.public_key_hex().unwrap_or_default());
        }
    }

    Ok(())
}
