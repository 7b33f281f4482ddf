//! Outbound notification port.
//!
//! Gateways surface authorization outcomes and device events as short
//! free-text summaries. Delivery is at-most-once with no guarantee: a
//! [`Notifier`] must return immediately and never report failure to the
//! caller, so alerting problems cannot stall or abort the protocol.

#[cfg(feature = "std")]
pub mod queue;
#[cfg(feature = "telegram")]
pub mod telegram;

#[cfg(feature = "std")]
pub use queue::{Deliver, QueuedNotifier};

use alloc::format;
use alloc::string::String;
use core::fmt;

/// Fire-and-forget sink for human-readable summaries.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Discards every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _message: &str) {}
}

/// Writes messages to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        log::info!(target: "duokey::notify", "{}", message);
    }
}

/// Keeps every message in memory, in order.
#[cfg(feature = "std")]
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    messages: std::sync::Mutex<alloc::vec::Vec<String>>,
}

#[cfg(feature = "std")]
impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> alloc::vec::Vec<String> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(feature = "std")]
impl Notifier for MemoryNotifier {
    fn notify(&self, message: &str) {
        match self.messages.lock() {
            Ok(mut guard) => guard.push(String::from(message)),
            Err(poisoned) => poisoned.into_inner().push(String::from(message)),
        }
    }
}

/// Failure of a single delivery attempt. Only ever logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The transport could not reach the endpoint.
    Transport,
    /// The endpoint answered with a non-success status.
    Rejected(u16),
    /// The delivery backend could not be started.
    Setup,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Transport => write!(f, "Notification transport failed"),
            DeliveryError::Rejected(status) => write!(f, "Notification rejected with status {}", status),
            DeliveryError::Setup => write!(f, "Notification backend failed to start"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeliveryError {}

pub fn auth_ok_summary(site_id: &str, device_id: &str) -> String {
    format!("AUTH_OK [{}]\n- dev: {}", site_id, device_id)
}

pub fn auth_fail_summary(site_id: &str, device_id: &str, reason: &str) -> String {
    format!("AUTH_FAIL [{}]\n- dev: {}\n- reason: {}", site_id, device_id, reason)
}

pub fn event_summary(site_id: &str, device_id: &str, event_type: &str, ts: i64) -> String {
    format!(
        "EVENT [{}]\n- dev: {}\n- type: {}\n- ts: {}",
        site_id, device_id, event_type, ts
    )
}
