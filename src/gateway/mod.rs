//! Gateway authorization service.
//!
//! One instance per authority. It holds the allow-list, the pre-shared
//! signing secret, its site identity and exactly one key share, all
//! read-only after construction, so a single `Gateway` can serve concurrent
//! requests from many devices without locking.
//!
//! Every rejection has a distinct [`GatewayError`] for logs and alerts; the
//! transport must collapse them into one external "authorization denied"
//! class and never echo signatures or reasons back to the caller.

#[cfg(feature = "server")]
pub mod http;

use alloc::collections::BTreeSet;
use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;

use crate::config::GatewayConfig;
use crate::mac::{self, SigningSecret};
use crate::notify::{self, LogNotifier, Notifier};
use crate::platform::Clock;
use crate::protocol::{AuthorizationRequest, AuthorizationResponse, EventAck, EventNotification};
use crate::sharing::KeyShare;

/// Internal reasons a gateway refuses a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayError {
    /// Device identity is not on the allow-list.
    DeviceNotAllowed,
    /// Signature does not verify for this site.
    BadSignature,
    /// No share is provisioned at this gateway.
    Misconfigured,
    /// Timestamp outside the configured freshness window.
    StaleTimestamp,
}

impl GatewayError {
    /// Short reason used in operator notifications.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::DeviceNotAllowed => "not allowed",
            GatewayError::BadSignature => "bad sig",
            GatewayError::Misconfigured => "share not configured",
            GatewayError::StaleTimestamp => "stale timestamp",
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::DeviceNotAllowed => write!(f, "Device not allowed"),
            GatewayError::BadSignature => write!(f, "Bad signature"),
            GatewayError::Misconfigured => write!(f, "Gateway share not configured"),
            GatewayError::StaleTimestamp => write!(f, "Request timestamp outside freshness window"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GatewayError {}

#[cfg(feature = "std")]
fn default_clock() -> Arc<dyn Clock> {
    Arc::new(crate::platform::SystemClock)
}

// Without a host clock every freshness check fails closed until
// `with_clock` installs a real one.
#[cfg(not(feature = "std"))]
fn default_clock() -> Arc<dyn Clock> {
    Arc::new(crate::platform::FixedClock(0))
}

/// One authority's share-release service.
pub struct Gateway {
    site_id: String,
    allowed_devices: BTreeSet<String>,
    secret: SigningSecret,
    share: Option<KeyShare>,
    max_clock_skew: Option<u64>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl Gateway {
    /// Creates a gateway that reports to the `log` facade.
    pub fn new(config: GatewayConfig) -> Self {
        if config.share.is_none() {
            log::warn!("[{}] no key share provisioned; all authorizations will fail", config.site_id);
        }
        Self {
            site_id: config.site_id,
            allowed_devices: config.allowed_devices,
            secret: config.signing_secret,
            share: config.share,
            max_clock_skew: config.max_clock_skew,
            clock: default_clock(),
            notifier: Arc::new(LogNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    /// Validates `request` and releases this authority's share.
    ///
    /// Checks, in order: allow-list, signature over `dev_id|ts|site_id`,
    /// optional freshness window, share presence.
    pub fn authorize(&self, request: &AuthorizationRequest) -> Result<AuthorizationResponse, GatewayError> {
        match self.check_authorize(request) {
            Ok(share) => {
                log::info!("[{}] AUTH_OK dev={}", self.site_id, request.dev_id);
                self.notifier
                    .notify(&notify::auth_ok_summary(&self.site_id, &request.dev_id));
                Ok(AuthorizationResponse::granted(&self.site_id, share))
            }
            Err(GatewayError::Misconfigured) => {
                log::error!("[{}] share requested by {} but none configured", self.site_id, request.dev_id);
                Err(GatewayError::Misconfigured)
            }
            Err(e) => {
                log::warn!("[{}] AUTH_FAIL dev={} reason={}", self.site_id, request.dev_id, e.reason());
                self.notifier
                    .notify(&notify::auth_fail_summary(&self.site_id, &request.dev_id, e.reason()));
                Err(e)
            }
        }
    }

    fn check_authorize(&self, request: &AuthorizationRequest) -> Result<&KeyShare, GatewayError> {
        if !self.allowed_devices.contains(&request.dev_id) {
            return Err(GatewayError::DeviceNotAllowed);
        }
        if !mac::verify(&self.secret, &request.subject(&self.site_id), &request.sig) {
            return Err(GatewayError::BadSignature);
        }
        if let Some(window) = self.max_clock_skew {
            let skew = self.clock.now().abs_diff(request.ts);
            if skew > window {
                return Err(GatewayError::StaleTimestamp);
            }
        }
        self.share.as_ref().ok_or(GatewayError::Misconfigured)
    }

    /// Accepts a signed device event and forwards it to the notifier.
    ///
    /// Purely observational: no gateway or device state changes.
    pub fn record_event(&self, event: &EventNotification) -> Result<EventAck, GatewayError> {
        if !mac::verify(&self.secret, &event.subject(&self.site_id), &event.sig) {
            log::warn!("[{}] event {} from {} rejected: bad sig", self.site_id, event.event_type, event.dev_id);
            return Err(GatewayError::BadSignature);
        }
        log::info!("[{}] EVENT dev={} type={} ts={}", self.site_id, event.dev_id, event.event_type, event.ts);
        self.notifier.notify(&notify::event_summary(
            &self.site_id,
            &event.dev_id,
            &event.event_type,
            event.ts,
        ));
        Ok(EventAck { ok: true })
    }
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field("site_id", &self.site_id)
            .field("allowed_devices", &self.allowed_devices.len())
            .field("share", &self.share.is_some())
            .field("max_clock_skew", &self.max_clock_skew)
            .finish()
    }
}
