//! Configuration value objects.
//!
//! Every component receives its configuration at construction time. The
//! library never reads the process environment; hosts (the binaries, an
//! embedded firmware shell, tests) hand in key/value pairs through
//! `from_vars`, which recognises the variable names below.
//!
//! | Variable                | Used by | Default                 |
//! |-------------------------|---------|-------------------------|
//! | `SITE_ID`               | gateway | `X`                     |
//! | `ALLOWED_DEVICES`       | gateway | empty (comma list)      |
//! | `HMAC_SECRET`           | both    | required                |
//! | `SHARE_B64`             | gateway | none (requests fail)    |
//! | `MAX_CLOCK_SKEW_SECS`   | gateway | none (no freshness)     |
//! | `BIND_ADDR`             | gateway | `127.0.0.1:8080`        |
//! | `TELEGRAM_BOT_TOKEN`    | gateway | none                    |
//! | `TELEGRAM_CHAT_ID`      | gateway | none                    |
//! | `DEVICE_ID`             | device  | `esp32-001`             |
//! | `PRIMARY_GATEWAY_URL`   | device  | `http://127.0.0.1:8080` |
//! | `PRIMARY_SITE_ID`       | device  | `A`                     |
//! | `SECONDARY_GATEWAY_URL` | device  | `http://127.0.0.1:8081` |
//! | `SECONDARY_SITE_ID`     | device  | `B`                     |
//! | `SECURE_FILE`           | device  | `secure_data.enc`       |
//! | `REQUEST_TIMEOUT_SECS`  | device  | `5`                     |

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

use crate::mac::SigningSecret;
use crate::sharing::KeyShare;

/// Default per-request timeout towards a gateway.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `HMAC_SECRET` is missing or empty.
    MissingSecret,
    /// `SHARE_B64` is set but is not a valid base64 share.
    InvalidShare,
    /// A numeric variable did not parse.
    InvalidNumber(&'static str),
    /// No gateway endpoint configured.
    NoGateways,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingSecret => write!(f, "HMAC_SECRET must be set and non-empty"),
            ConfigError::InvalidShare => write!(f, "SHARE_B64 is not a valid base64 share"),
            ConfigError::InvalidNumber(var) => write!(f, "{} must be a non-negative integer", var),
            ConfigError::NoGateways => write!(f, "At least one gateway must be configured"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Telegram bot used by a gateway for outbound alerts.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"***SENSITIVE***")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Configuration for one gateway (authority) instance.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// This authority's site identity ("A", "B", ...).
    pub site_id: String,
    /// Device identities allowed to request the share.
    pub allowed_devices: BTreeSet<String>,
    pub signing_secret: SigningSecret,
    /// The one share held by this authority. `None` makes every
    /// authorization fail as misconfigured.
    pub share: Option<KeyShare>,
    /// Optional freshness window in seconds. `None` accepts any timestamp,
    /// which leaves signed requests replayable.
    pub max_clock_skew: Option<u64>,
    /// Listen address for the HTTP transport.
    pub bind_addr: String,
    pub telegram: Option<TelegramConfig>,
}

impl GatewayConfig {
    pub fn new(site_id: &str, signing_secret: SigningSecret) -> Self {
        Self {
            site_id: site_id.to_string(),
            allowed_devices: BTreeSet::new(),
            signing_secret,
            share: None,
            max_clock_skew: None,
            bind_addr: String::from("127.0.0.1:8080"),
            telegram: None,
        }
    }

    pub fn allow(mut self, device_id: &str) -> Self {
        self.allowed_devices.insert(device_id.to_string());
        self
    }

    pub fn with_share(mut self, share: KeyShare) -> Self {
        self.share = Some(share);
        self
    }

    pub fn with_max_clock_skew(mut self, seconds: u64) -> Self {
        self.max_clock_skew = Some(seconds);
        self
    }

    /// Builds the configuration from `KEY=value` pairs.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars = collect(vars);

        let secret = secret_from(&vars)?;
        let site_id = non_empty(&vars, "SITE_ID").unwrap_or("X");
        let mut config = GatewayConfig::new(site_id, secret);

        if let Some(list) = non_empty(&vars, "ALLOWED_DEVICES") {
            config.allowed_devices = list
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        if let Some(encoded) = non_empty(&vars, "SHARE_B64") {
            let share = KeyShare::from_base64(encoded).map_err(|_| ConfigError::InvalidShare)?;
            config.share = Some(share);
        }

        config.max_clock_skew = parse_u64(&vars, "MAX_CLOCK_SKEW_SECS")?;

        if let Some(addr) = non_empty(&vars, "BIND_ADDR") {
            config.bind_addr = addr.to_string();
        }

        if let (Some(bot_token), Some(chat_id)) = (
            non_empty(&vars, "TELEGRAM_BOT_TOKEN"),
            non_empty(&vars, "TELEGRAM_CHAT_ID"),
        ) {
            config.telegram = Some(TelegramConfig {
                bot_token: bot_token.to_string(),
                chat_id: chat_id.to_string(),
            });
        }

        Ok(config)
    }
}

/// Where the device reaches one authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub site_id: String,
    /// Base URL; `/authorize` and `/event` are appended.
    pub url: String,
}

impl GatewayEndpoint {
    pub fn new(site_id: &str, url: &str) -> Self {
        Self {
            site_id: site_id.to_string(),
            url: url.trim_end_matches('/').to_string(),
        }
    }
}

/// Configuration for the device agent.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub device_id: String,
    pub gateways: Vec<GatewayEndpoint>,
    pub signing_secret: SigningSecret,
    /// Path of the persisted protected blob.
    pub payload_path: String,
    pub request_timeout: Duration,
}

impl DeviceConfig {
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let vars = collect(vars);

        let signing_secret = secret_from(&vars)?;
        let gateways = vec![
            GatewayEndpoint::new(
                non_empty(&vars, "PRIMARY_SITE_ID").unwrap_or("A"),
                non_empty(&vars, "PRIMARY_GATEWAY_URL").unwrap_or("http://127.0.0.1:8080"),
            ),
            GatewayEndpoint::new(
                non_empty(&vars, "SECONDARY_SITE_ID").unwrap_or("B"),
                non_empty(&vars, "SECONDARY_GATEWAY_URL").unwrap_or("http://127.0.0.1:8081"),
            ),
        ];
        let request_timeout = parse_u64(&vars, "REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        Ok(Self {
            device_id: non_empty(&vars, "DEVICE_ID").unwrap_or("esp32-001").to_string(),
            gateways,
            signing_secret,
            payload_path: non_empty(&vars, "SECURE_FILE")
                .unwrap_or("secure_data.enc")
                .to_string(),
            request_timeout,
        })
    }

    /// Ensures the configuration can drive a full authorization pass.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        if self.gateways.is_empty() {
            return Err(ConfigError::NoGateways);
        }
        Ok(())
    }
}

fn collect<I, K, V>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    vars.into_iter()
        .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
        .collect()
}

fn non_empty<'a>(vars: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// The signing secret is taken byte for byte; whitespace only counts as
/// missing.
fn secret_from(vars: &BTreeMap<String, String>) -> Result<SigningSecret, ConfigError> {
    match vars.get("HMAC_SECRET") {
        Some(raw) if !raw.trim().is_empty() => Ok(SigningSecret::from(raw.as_str())),
        _ => Err(ConfigError::MissingSecret),
    }
}

fn parse_u64(vars: &BTreeMap<String, String>, key: &'static str) -> Result<Option<u64>, ConfigError> {
    match non_empty(vars, key) {
        Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(None),
    }
}
