//! Message authentication for device/gateway requests.
//!
//! Requests are signed with HMAC-SHA-256 under a pre-shared secret and the
//! digest travels as lowercase hex. The signed subject is a `|`-joined string
//! whose field order is fixed:
//!
//! - authorize: `<dev_id>|<ts>|<site_id>`
//! - event:     `<dev_id>|<event_type>|<ts>|<site_id>`
//!
//! The target site is part of the subject, so a signature produced for
//! gateway `A` does not verify at gateway `B`.
//!
//! # Replay
//! The timestamp is bound into the signature but is advisory: nothing here
//! tracks nonces or enforces freshness, so a captured request verifies again
//! until the secret changes. Gateways may opt into a clock-skew window
//! (see [`crate::gateway::Gateway`]); it is off by default.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of a raw HMAC-SHA-256 tag.
pub const TAG_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacError {
    /// The MAC could not be keyed with the supplied secret.
    InvalidKey,
}

impl fmt::Display for MacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacError::InvalidKey => write!(f, "Invalid signing secret"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for MacError {}

/// Pre-shared secret between a device and an authority.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SigningSecret {
    bytes: Vec<u8>,
}

impl SigningSecret {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for SigningSecret {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSecret")
            .field("length", &self.bytes.len())
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

fn keyed(secret: &SigningSecret) -> Result<HmacSha256, MacError> {
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| MacError::InvalidKey)
}

/// Signs `message`, returning the lowercase hex digest.
pub fn sign(secret: &SigningSecret, message: &str) -> Result<String, MacError> {
    let mut mac = keyed(secret)?;
    mac.update(message.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies a hex digest against `message` in constant time.
///
/// Only the canonical lowercase form produced by [`sign`] is accepted.
/// Malformed or upper-case hex and a wrong-length digest are simply a failed
/// verification.
pub fn verify(secret: &SigningSecret, message: &str, candidate_hex: &str) -> bool {
    if !is_lower_hex(candidate_hex) {
        return false;
    }
    let candidate = match hex::decode(candidate_hex) {
        Ok(bytes) if bytes.len() == TAG_LEN => bytes,
        _ => return false,
    };
    let mut mac = match keyed(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&candidate).is_ok()
}

fn is_lower_hex(candidate: &str) -> bool {
    candidate.len() == TAG_LEN * 2
        && candidate.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Subject string for an authorization request.
pub fn authorize_subject(device_id: &str, ts: i64, site_id: &str) -> String {
    format!("{}|{}|{}", device_id, ts, site_id)
}

/// Subject string for an event notification.
pub fn event_subject(device_id: &str, event_type: &str, ts: i64, site_id: &str) -> String {
    format!("{}|{}|{}|{}", device_id, event_type, ts, site_id)
}
