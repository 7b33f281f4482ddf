//! Key share definition.
//!
//! # Security
//! - Implements `Zeroize` and `ZeroizeOnDrop` to wipe share bytes from memory.
//! - `Debug` implementation redacts the actual value.

use alloc::string::String;
use alloc::vec::Vec;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::SharingError;

/// One half of a split symmetric key. Meaningless in isolation.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyShare {
    value: Vec<u8>,
}

impl fmt::Debug for KeyShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyShare")
            .field("length", &self.value.len())
            .field("value", &"***SENSITIVE***")
            .finish()
    }
}

impl KeyShare {
    /// Creates a share from raw bytes.
    ///
    /// # Returns
    /// * `Err(SharingError::EmptyShare)` if `value` is empty.
    pub fn new(value: Vec<u8>) -> Result<Self, SharingError> {
        if value.is_empty() {
            return Err(SharingError::EmptyShare);
        }
        Ok(Self { value })
    }

    /// Decodes a share from standard base64 (the `share_b64` wire field).
    pub fn from_base64(encoded: &str) -> Result<Self, SharingError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| SharingError::InvalidEncoding)?;
        Self::new(bytes)
    }

    /// Encodes the share as standard base64.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.value)
    }

    /// Same as [`to_base64`](Self::to_base64) but wipes the encoded copy on drop.
    pub fn to_base64_zeroizing(&self) -> Zeroizing<String> {
        Zeroizing::new(self.to_base64())
    }

    /// Returns the share bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.value
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
