//! Randomness sources.
//!
//! Share generation and payload nonces draw from an [`EntropySource`] so the
//! primitives stay usable on `no_std` targets and can be driven by
//! deterministic sources in tests. On hosted targets [`OsEntropy`] wraps the
//! operating system CSPRNG.

#[cfg(feature = "std")]
pub mod os;

#[cfg(feature = "std")]
pub use os::OsEntropy;

use core::fmt;

/// Error types for entropy collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntropyError {
    /// The source could not produce the requested bytes.
    CollectionFailed,
}

impl fmt::Display for EntropyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntropyError::CollectionFailed => write!(f, "Entropy collection failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for EntropyError {}

/// A trait for entropy sources.
pub trait EntropySource {
    /// Returns a unique identifier for the source.
    fn name(&self) -> &'static str;

    /// Fills `dest` with random bytes from the source.
    ///
    /// # Returns
    /// * `Ok(())` on success.
    /// * `Err(EntropyError)` if the source fails; `dest` contents are then unspecified.
    fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError>;
}
