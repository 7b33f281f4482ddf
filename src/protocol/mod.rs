//! Wire messages exchanged between the device and each gateway.
//!
//! Field names match the JSON network contract (`dev_id`, `ts`, `sig`,
//! `type`, `site`, `share_b64`). A response carries `share_b64` if and only
//! if the authorization was granted.

use alloc::string::{String, ToString};
use core::fmt;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::mac::{self, MacError, SigningSecret};
use crate::sharing::{KeyShare, SharingError};

/// Signed request for a gateway's key share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub dev_id: String,
    pub ts: i64,
    /// Hex HMAC over `dev_id|ts|site_id`.
    pub sig: String,
}

impl AuthorizationRequest {
    /// Builds a request addressed to `site_id`.
    pub fn signed(
        secret: &SigningSecret,
        device_id: &str,
        ts: i64,
        site_id: &str,
    ) -> Result<Self, MacError> {
        let sig = mac::sign(secret, &mac::authorize_subject(device_id, ts, site_id))?;
        Ok(Self {
            dev_id: device_id.to_string(),
            ts,
            sig,
        })
    }

    /// The string a gateway for `site_id` verifies the signature against.
    pub fn subject(&self, site_id: &str) -> String {
        mac::authorize_subject(&self.dev_id, self.ts, site_id)
    }
}

/// Gateway answer to an [`AuthorizationRequest`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub ok: bool,
    pub site: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    share_b64: Option<String>,
}

impl AuthorizationResponse {
    /// A granted response carrying `share`.
    pub fn granted(site_id: &str, share: &KeyShare) -> Self {
        Self {
            ok: true,
            site: site_id.to_string(),
            share_b64: Some(share.to_base64()),
        }
    }

    pub fn has_share(&self) -> bool {
        self.share_b64.is_some()
    }

    /// Decodes the released share.
    ///
    /// # Returns
    /// * `Err(SharingError::EmptyShare)` when the response is not a grant or
    ///   carries no share.
    pub fn share(&self) -> Result<KeyShare, SharingError> {
        match (&self.share_b64, self.ok) {
            (Some(encoded), true) => KeyShare::from_base64(encoded),
            _ => Err(SharingError::EmptyShare),
        }
    }
}

impl Drop for AuthorizationResponse {
    fn drop(&mut self) {
        if let Some(share) = self.share_b64.as_mut() {
            share.zeroize();
        }
    }
}

impl fmt::Debug for AuthorizationResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationResponse")
            .field("ok", &self.ok)
            .field("site", &self.site)
            .field("share_b64", &self.share_b64.as_ref().map(|_| "***SENSITIVE***"))
            .finish()
    }
}

/// Outcome events the device reports to every gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    BootLocked,
    AuthFail,
    MountOk,
    MountFail,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BootLocked => "BOOT_LOCKED",
            EventType::AuthFail => "AUTH_FAIL",
            EventType::MountOk => "MOUNT_OK",
            EventType::MountFail => "MOUNT_FAIL",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-way, signed informational message from device to gateway.
///
/// `event_type` is free text on the wire; gateways accept any value with a
/// valid signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventNotification {
    pub dev_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub ts: i64,
    /// Hex HMAC over `dev_id|type|ts|site_id`.
    pub sig: String,
}

impl EventNotification {
    pub fn signed(
        secret: &SigningSecret,
        device_id: &str,
        event: EventType,
        ts: i64,
        site_id: &str,
    ) -> Result<Self, MacError> {
        let sig = mac::sign(secret, &mac::event_subject(device_id, event.as_str(), ts, site_id))?;
        Ok(Self {
            dev_id: device_id.to_string(),
            event_type: event.as_str().to_string(),
            ts,
            sig,
        })
    }

    pub fn subject(&self, site_id: &str) -> String {
        mac::event_subject(&self.dev_id, &self.event_type, self.ts, site_id)
    }
}

/// Acknowledgement of an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAck {
    pub ok: bool,
}

/// Uniform body for every rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub ok: bool,
    pub error: String,
}

impl Rejection {
    pub fn denied() -> Self {
        Self {
            ok: false,
            error: String::from("authorization denied"),
        }
    }
}
