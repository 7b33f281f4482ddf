//! One-time provisioning: fresh key, sealed payload, two shares.
//!
//! The key is never returned. Once the shares are handed to the two
//! authorities and the blob written to the device, nothing on the
//! provisioning host can open the payload again.

use core::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use zeroize::Zeroizing;

use crate::entropy::EntropySource;
use crate::payload::{self, PayloadError, ProtectedBlob, SymmetricKey};
use crate::sharing::{self, KeyShare, SharingError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionError {
    /// The supplied key was not valid base64 or not 32 bytes.
    InvalidKey,
    Sharing(SharingError),
    Payload(PayloadError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::InvalidKey => write!(f, "Key must be 32 bytes of base64"),
            ProvisionError::Sharing(e) => write!(f, "Splitting failed: {}", e),
            ProvisionError::Payload(e) => write!(f, "Sealing failed: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProvisionError {}

impl From<SharingError> for ProvisionError {
    fn from(e: SharingError) -> Self {
        ProvisionError::Sharing(e)
    }
}

impl From<PayloadError> for ProvisionError {
    fn from(e: PayloadError) -> Self {
        ProvisionError::Payload(e)
    }
}

/// Output of [`provision`]. Share A goes to the primary authority, share B
/// to the secondary, the blob to the device.
#[derive(Debug)]
pub struct Provisioned {
    pub share_a: KeyShare,
    pub share_b: KeyShare,
    pub blob: ProtectedBlob,
}

/// Seals `plaintext` under a fresh key and splits that key.
pub fn provision<R: EntropySource + ?Sized>(
    plaintext: &[u8],
    rng: &mut R,
) -> Result<Provisioned, ProvisionError> {
    let key = SymmetricKey::generate(rng)?;
    let blob = payload::encrypt(&key, plaintext, rng)?;
    let (share_a, share_b) = sharing::split(key.as_bytes(), rng)?;
    log::info!("provisioned payload: {} bytes sealed, {}-byte shares", plaintext.len(), share_a.len());
    Ok(Provisioned { share_a, share_b, blob })
}

/// Splits an existing base64 device key without touching any payload.
pub fn split_existing_key<R: EntropySource + ?Sized>(
    key_b64: &str,
    rng: &mut R,
) -> Result<(KeyShare, KeyShare), ProvisionError> {
    let raw = Zeroizing::new(
        STANDARD
            .decode(key_b64.trim())
            .map_err(|_| ProvisionError::InvalidKey)?,
    );
    let key = SymmetricKey::from_slice(&raw).map_err(|_| ProvisionError::InvalidKey)?;
    Ok(sharing::split(key.as_bytes(), rng)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entropy::EntropyError;

    struct MockEntropy {
        counter: u8,
    }

    impl EntropySource for MockEntropy {
        fn name(&self) -> &'static str { "Mock" }
        fn fill(&mut self, dest: &mut [u8]) -> Result<(), EntropyError> {
            for b in dest.iter_mut() {
                *b = self.counter;
                self.counter = self.counter.wrapping_mul(13).wrapping_add(7);
            }
            Ok(())
        }
    }

    struct DeadEntropy;

    impl EntropySource for DeadEntropy {
        fn name(&self) -> &'static str { "Dead" }
        fn fill(&mut self, _dest: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError::CollectionFailed)
        }
    }

    #[test]
    fn test_provisioned_shares_open_blob() {
        let mut rng = MockEntropy { counter: 3 };
        let out = provision(b"payload v1", &mut rng).unwrap();

        assert_eq!(out.share_a.len(), 32);
        assert_ne!(out.share_a, out.share_b);

        let key = sharing::reconstruct(&out.share_a, &out.share_b).unwrap();
        assert_eq!(payload::decrypt(&key, &out.blob).unwrap().as_slice(), b"payload v1");
    }

    #[test]
    fn test_single_share_is_not_the_key() {
        let mut rng = MockEntropy { counter: 11 };
        let out = provision(b"secret", &mut rng).unwrap();
        assert_eq!(
            payload::decrypt(out.share_a.as_bytes(), &out.blob).unwrap_err(),
            PayloadError::AuthenticationFailure
        );
        assert_eq!(
            payload::decrypt(out.share_b.as_bytes(), &out.blob).unwrap_err(),
            PayloadError::AuthenticationFailure
        );
    }

    #[test]
    fn test_split_existing_key() {
        let key = [0x42u8; 32];
        let encoded = STANDARD.encode(key);
        let mut rng = MockEntropy { counter: 1 };

        let (a, b) = split_existing_key(&alloc::format!("{}\n", encoded), &mut rng).unwrap();
        assert_eq!(sharing::reconstruct(&a, &b).unwrap().as_slice(), &key);
    }

    #[test]
    fn test_split_existing_key_rejects_bad_input() {
        let mut rng = MockEntropy { counter: 1 };
        assert_eq!(split_existing_key("not base64!", &mut rng).unwrap_err(), ProvisionError::InvalidKey);
        assert_eq!(
            split_existing_key(&STANDARD.encode([1u8; 16]), &mut rng).unwrap_err(),
            ProvisionError::InvalidKey
        );
    }

    #[test]
    fn test_rng_failure() {
        assert_eq!(
            provision(b"x", &mut DeadEntropy).unwrap_err(),
            ProvisionError::Payload(PayloadError::RngFailure)
        );
    }
}
