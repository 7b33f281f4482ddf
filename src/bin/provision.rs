//! DuoKey provisioning.
//!
//! `seal` encrypts a payload under a fresh key, writes the protected blob
//! and prints the two shares. `split` only splits an existing key. The key
//! itself is never printed or stored.
//!
//! ```bash
//! duokey-provision seal --input payload.txt --output secure_data.enc
//! DEVICE_KEY_B64=... duokey-provision split
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use duokey::entropy::OsEntropy;
use duokey::provision;
use duokey::sharing::KeyShare;
use duokey::storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "duokey-provision", version, about = "Create DuoKey shares and sealed payloads")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seal a payload under a fresh key and split the key
    Seal {
        /// Plaintext payload
        #[arg(long)]
        input: PathBuf,
        /// Where to write the protected blob
        #[arg(long, default_value = "secure_data.enc")]
        output: PathBuf,
    },
    /// Split an existing 32-byte base64 key
    Split {
        #[arg(long, env = "DEVICE_KEY_B64", hide_env_values = true)]
        key: String,
    },
}

fn print_shares(share_a: &KeyShare, share_b: &KeyShare) {
    println!("SHARE_A_B64={}", share_a.to_base64_zeroizing().as_str());
    println!("SHARE_B_B64={}", share_b.to_base64_zeroizing().as_str());
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("duokey=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut rng = OsEntropy::new();
    match Cli::parse().command {
        Command::Seal { input, output } => {
            let plaintext = zeroize::Zeroizing::new(
                std::fs::read(&input).with_context(|| format!("cannot read {}", input.display()))?,
            );
            let bundle = provision::provision(&plaintext, &mut rng)?;
            storage::write_blob(&output, &bundle.blob)
                .with_context(|| format!("cannot write {}", output.display()))?;
            eprintln!("wrote {}", output.display());
            print_shares(&bundle.share_a, &bundle.share_b);
        }
        Command::Split { key } => {
            let key = zeroize::Zeroizing::new(key);
            let (share_a, share_b) = provision::split_existing_key(&key, &mut rng)?;
            print_shares(&share_a, &share_b);
        }
    }
    Ok(())
}
