//! DuoKey device agent: one boot, authorize, mount pass.
//!
//! Exits non-zero unless the payload was mounted.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use duokey::config::{DeviceConfig, GatewayEndpoint};
use duokey::device::{AuthorityClient, DeviceAgent, DeviceState, HttpAuthorityClient, StateObserver};
use duokey::storage::FileBlob;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "duokey-device", version, about = "Boot, collect both key shares and open the sealed payload")]
struct Args {
    /// Protected payload file, overrides SECURE_FILE
    #[arg(long)]
    payload: Option<String>,

    /// Do not print the decrypted payload
    #[arg(long)]
    quiet: bool,
}

struct ConsoleObserver;

impl StateObserver for ConsoleObserver {
    fn on_state_change(&self, from: DeviceState, to: DeviceState) {
        println!("STATE: {} -> {}", from, to);
    }
}

fn authority(endpoint: &GatewayEndpoint, config: &DeviceConfig) -> anyhow::Result<Arc<dyn AuthorityClient>> {
    let client = HttpAuthorityClient::new(endpoint, config.request_timeout)
        .with_context(|| format!("cannot build client for site {}", endpoint.site_id))?;
    Ok(Arc::new(client))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("duokey=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = DeviceConfig::from_vars(std::env::vars()).context("invalid device configuration")?;
    if let Some(path) = args.payload {
        config.payload_path = path;
    }
    config.validate()?;

    let (primary, secondary) = match config.gateways.as_slice() {
        [a, b] => (authority(a, &config)?, authority(b, &config)?),
        other => bail!("exactly two gateways are required, got {}", other.len()),
    };

    let mut agent = DeviceAgent::new(
        &config.device_id,
        config.signing_secret.clone(),
        primary,
        secondary,
        Box::new(FileBlob::new(&config.payload_path)),
    );
    agent.add_observer(Box::new(ConsoleObserver));

    let outcome = agent.run();
    agent.drain_events();

    match outcome {
        Ok(plaintext) => {
            if !args.quiet {
                println!("SECURE CONTENT:");
                println!("{}", String::from_utf8_lossy(&plaintext));
            }
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("{} ended in {}", agent.device_id(), agent.state()))),
    }
}
