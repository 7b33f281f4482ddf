//! Split and reconstruct over byte-wise XOR.

use alloc::vec;
use alloc::vec::Vec;
use zeroize::Zeroizing;

use super::{KeyShare, SharingError};
use crate::entropy::EntropySource;

/// Splits `key` into two shares of identical length.
///
/// `share_a` is drawn fresh from `rng`; `share_b = share_a ^ key`.
pub fn split<R: EntropySource + ?Sized>(
    key: &[u8],
    rng: &mut R,
) -> Result<(KeyShare, KeyShare), SharingError> {
    if key.is_empty() {
        return Err(SharingError::EmptySecret);
    }

    let mut share_a = Zeroizing::new(vec![0u8; key.len()]);
    rng.fill(&mut share_a).map_err(|_| SharingError::RngFailure)?;

    let mut share_b = Zeroizing::new(vec![0u8; key.len()]);
    xor_into(&share_a, key, &mut share_b);

    let a = KeyShare::new(core::mem::take(&mut *share_a))?;
    let b = KeyShare::new(core::mem::take(&mut *share_b))?;
    Ok((a, b))
}

/// Recombines two shares into the original key.
///
/// Fails only on a length mismatch. A wrong but equal-length share yields a
/// wrong key silently; see the module docs.
pub fn reconstruct(
    share_a: &KeyShare,
    share_b: &KeyShare,
) -> Result<Zeroizing<Vec<u8>>, SharingError> {
    if share_a.len() != share_b.len() {
        return Err(SharingError::LengthMismatch);
    }
    let mut key = Zeroizing::new(vec![0u8; share_a.len()]);
    xor_into(share_a.as_bytes(), share_b.as_bytes(), &mut key);
    Ok(key)
}

/// Constant-time XOR of `a` and `b` into `out`, eight bytes at a time.
/// Callers guarantee all three slices have the same length.
#[inline(always)]
fn xor_into(a: &[u8], b: &[u8], out: &mut [u8]) {
    debug_assert!(a.len() == out.len() && b.len() == out.len());

    let mut out_words = out.chunks_exact_mut(8);
    let mut a_words = a.chunks_exact(8);
    let mut b_words = b.chunks_exact(8);

    for ((o, x), y) in (&mut out_words).zip(&mut a_words).zip(&mut b_words) {
        let mut xa = [0u8; 8];
        let mut xb = [0u8; 8];
        xa.copy_from_slice(x);
        xb.copy_from_slice(y);
        let w = u64::from_ne_bytes(xa) ^ u64::from_ne_bytes(xb);
        o.copy_from_slice(&w.to_ne_bytes());
    }

    let tail = out_words.into_remainder();
    for ((o, x), y) in tail.iter_mut().zip(a_words.remainder()).zip(b_words.remainder()) {
        *o = x ^ y;
    }
}
