//! Telegram Bot API delivery.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Serialize;

use super::queue::Deliver;
use super::DeliveryError;
use crate::config::TelegramConfig;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Posts each message to `sendMessage` for one chat.
pub struct TelegramSink {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramSink {
    /// Builds the sink. Must be called off any async runtime thread (the
    /// blocking client owns its own runtime).
    pub fn new(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        Self::with_base(config, API_BASE)
    }

    fn with_base(config: &TelegramConfig, base: &str) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                log::error!("[tg] client setup failed: {}", e);
                DeliveryError::Setup
            })?;
        Ok(Self {
            client,
            endpoint: format!("{}/bot{}/sendMessage", base, config.bot_token),
            chat_id: config.chat_id.clone(),
        })
    }
}

impl Deliver for TelegramSink {
    fn deliver(&mut self, message: &str) -> Result<(), DeliveryError> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: message,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|_| DeliveryError::Transport)?;
        let status = resp.status();
        if !status.is_success() {
            log::warn!("[tg] {}", status);
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
