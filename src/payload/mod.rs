//! AEAD payload codec.
//!
//! The protected blob is sealed with ChaCha20-Poly1305 under a 32-byte key.
//!
//! # Format
//! `[Nonce (12)] [Ciphertext (...)] [Tag (16)]`, bit-exact. The nonce is
//! drawn fresh for every encryption and stored in the clear.
//!
//! # Security
//! - **Fail closed**: `decrypt` verifies the tag before releasing anything;
//!   a wrong key, a flipped bit or a truncated file all yield
//!   `AuthenticationFailure` and no plaintext.
//! - **Nonce uniqueness**: a nonce must never repeat under one key. Every
//!   provisioning run generates both a fresh key and a fresh nonce.

use alloc::vec::Vec;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use core::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::entropy::EntropySource;

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;
/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Errors for payload sealing and opening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Key is not `KEY_LEN` bytes (encryption side).
    InvalidKeyLength,
    /// Tag did not verify: wrong key, tampered or truncated data.
    AuthenticationFailure,
    /// Serialized blob is shorter than nonce + tag.
    Truncated,
    /// Random number generator failure while drawing a key or nonce.
    RngFailure,
    /// The cipher refused to encrypt.
    EncryptionFailed,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::InvalidKeyLength => write!(f, "Key must be {} bytes", KEY_LEN),
            PayloadError::AuthenticationFailure => write!(f, "Payload authentication failed"),
            PayloadError::Truncated => write!(f, "Protected blob is truncated"),
            PayloadError::RngFailure => write!(f, "Random number generator failure"),
            PayloadError::EncryptionFailed => write!(f, "Encryption failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PayloadError {}

/// A 32-byte symmetric key. Lives only in memory and is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_LEN],
}

impl SymmetricKey {
    /// Draws a fresh random key.
    pub fn generate<R: EntropySource + ?Sized>(rng: &mut R) -> Result<Self, PayloadError> {
        let mut bytes = [0u8; KEY_LEN];
        if rng.fill(&mut bytes).is_err() {
            bytes.zeroize();
            return Err(PayloadError::RngFailure);
        }
        Ok(Self { bytes })
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, PayloadError> {
        if bytes.len() != KEY_LEN {
            return Err(PayloadError::InvalidKeyLength);
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(***SENSITIVE***)")
    }
}

/// Nonce plus ciphertext-with-tag, as persisted at rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedBlob {
    pub nonce: [u8; NONCE_LEN],
    /// AEAD output: ciphertext followed by the 16-byte tag.
    pub ciphertext: Vec<u8>,
}

impl ProtectedBlob {
    /// Parses the on-disk layout. Only checks the minimum length; the tag is
    /// checked by [`decrypt`].
    pub fn from_bytes(data: &[u8]) -> Result<Self, PayloadError> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(PayloadError::Truncated);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Serializes to `nonce || ciphertext || tag`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }
}

/// Seals `plaintext` under `key` with a fresh random nonce.
pub fn encrypt<R: EntropySource + ?Sized>(
    key: &SymmetricKey,
    plaintext: &[u8],
    rng: &mut R,
) -> Result<ProtectedBlob, PayloadError> {
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce).map_err(|_| PayloadError::RngFailure)?;

    let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| PayloadError::InvalidKeyLength)?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| PayloadError::EncryptionFailed)?;

    Ok(ProtectedBlob { nonce, ciphertext })
}

/// Opens `blob` under `key`.
///
/// Accepts a raw key slice because the key usually comes straight out of
/// share reconstruction; a key of the wrong length is reported exactly like
/// a wrong key.
pub fn decrypt(key: &[u8], blob: &ProtectedBlob) -> Result<Zeroizing<Vec<u8>>, PayloadError> {
    let cipher = match ChaCha20Poly1305::new_from_slice(key) {
        Ok(cipher) => cipher,
        Err(_) => {
            log::debug!("decrypt: key length {} != {}", key.len(), KEY_LEN);
            return Err(PayloadError::AuthenticationFailure);
        }
    };
    cipher
        .decrypt(Nonce::from_slice(&blob.nonce), blob.ciphertext.as_slice())
        .map(Zeroizing::new)
        .map_err(|_| PayloadError::AuthenticationFailure)
}
