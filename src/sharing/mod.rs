//! 2-of-2 XOR secret sharing.
//!
//! A key `K` is split into `share_a` (uniformly random, same length as `K`)
//! and `share_b = share_a ^ K`. Each share alone is uniformly distributed and
//! independent of `K`; both together recover `K` exactly.
//!
//! # Limitations
//! - **No integrity**: a corrupted, stale or swapped share reconstructs a
//!   wrong key without any error here. The mismatch only surfaces downstream
//!   when the payload's AEAD tag fails to verify. There is no per-share MAC.
//! - **One key per share pair**: `share_a` is a one-time pad. Splitting two
//!   different keys with the same `share_a` leaks `K1 ^ K2`; always split
//!   with a fresh entropy draw.
//! - **No k-of-n**: exactly two shares, both required.

pub mod share;
mod xor;

pub use share::KeyShare;
pub use xor::{reconstruct, split};

use core::fmt;

/// Errors for secret sharing operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingError {
    /// The key to split is empty.
    EmptySecret,
    /// Share value is empty.
    EmptyShare,
    /// The two shares have different lengths.
    LengthMismatch,
    /// A share could not be decoded from its transport encoding.
    InvalidEncoding,
    /// Random number generator failure.
    RngFailure,
}

impl fmt::Display for SharingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharingError::EmptySecret => write!(f, "Secret is empty"),
            SharingError::EmptyShare => write!(f, "Share is empty"),
            SharingError::LengthMismatch => write!(f, "Shares length mismatch"),
            SharingError::InvalidEncoding => write!(f, "Share is not valid base64"),
            SharingError::RngFailure => write!(f, "Random number generator failure"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for SharingError {}
