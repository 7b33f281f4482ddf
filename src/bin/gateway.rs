//! DuoKey gateway: releases one authority's key share over HTTP.
//!
//! Configuration comes from the environment (`SITE_ID`, `ALLOWED_DEVICES`,
//! `HMAC_SECRET`, `SHARE_B64`, ...). See `duokey::config` for the full list.
//!
//! ```bash
//! SITE_ID=A ALLOWED_DEVICES=esp32-001 HMAC_SECRET=... SHARE_B64=... duokey-gateway
//! duokey-gateway --bind 0.0.0.0:8080
//! ```

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use duokey::config::GatewayConfig;
use duokey::gateway::{http, Gateway};
use duokey::notify::{LogNotifier, Notifier};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "duokey-gateway", version, about = "Share-release gateway for one DuoKey authority")]
struct Args {
    /// Listen address, overrides BIND_ADDR
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("duokey=info")),
        )
        .init();

    let args = Args::parse();
    let config = GatewayConfig::from_vars(std::env::vars()).context("invalid gateway configuration")?;
    let addr = args.bind.unwrap_or_else(|| config.bind_addr.clone());

    let notifier = build_notifier(&config)?;
    let gateway = Arc::new(Gateway::new(config).with_notifier(notifier));

    println!("[{}] gateway listening on {}", gateway.site_id(), addr);
    http::serve(gateway, &addr)
        .await
        .with_context(|| format!("gateway server on {} failed", addr))
}

#[cfg(feature = "telegram")]
fn build_notifier(config: &GatewayConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    use duokey::notify::telegram::TelegramSink;
    use duokey::notify::QueuedNotifier;

    match config.telegram.clone() {
        Some(telegram) => {
            let queued = QueuedNotifier::spawn(64, move || TelegramSink::new(&telegram))
                .context("failed to start notification worker")?;
            Ok(Arc::new(queued))
        }
        None => Ok(Arc::new(LogNotifier)),
    }
}

#[cfg(not(feature = "telegram"))]
fn build_notifier(config: &GatewayConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    if config.telegram.is_some() {
        log::warn!("TELEGRAM_* set but built without the `telegram` feature; alerts go to the log");
    }
    Ok(Arc::new(LogNotifier))
}
