//! OPRF-shaped scalar multiplication on the Ristretto group.
//!
//! `generateOPRFTrapdoor` (owned by the search index, not this crate) derives
//! `T(w) = scalar_mult(K, H(w))`. This module supplies the two curve-level
//! primitives it needs: `hash_to_point` (hash-to-curve via uniform bytes) and
//! `scalar_mult`. Keeping them here — rather than in the search crate —
//! mirrors the original layering: the search index is a *consumer* of
//! kernel-level crypto primitives, not an implementer of them.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rand_core::{OsRng, RngCore};

use crate::kdf::hash32;

pub const SCALAR_BYTES: usize = 32;
pub const POINT_BYTES: usize = 32;

/// Hash an arbitrary byte string onto the Ristretto group.
///
/// Uses `from_uniform_bytes` over 64 bytes of BLAKE2b output (32 bytes of
/// `H(w)` concatenated with 32 bytes of `H(H(w))`) so the mapping covers the
/// full group uniformly rather than biasing toward a 32-byte-derived subset.
pub fn hash_to_point(data: &[u8]) -> RistrettoPoint {
    let h1 = hash32(data);
    let h2 = hash32(&h1);
    let mut wide = [0u8; 64];
    wide[..32].copy_from_slice(&h1);
    wide[32..].copy_from_slice(&h2);
    RistrettoPoint::from_uniform_bytes(&wide)
}

/// Derive a scalar from a 32-byte secret key, clamping into the group order
/// via `Scalar::from_bytes_mod_order`.
pub fn bytes_to_scalar(key: &[u8]) -> Scalar {
    let mut buf = [0u8; SCALAR_BYTES];
    let n = key.len().min(SCALAR_BYTES);
    buf[..n].copy_from_slice(&key[..n]);
    Scalar::from_bytes_mod_order(buf)
}

/// `scalar * point`, encoded to its canonical 32-byte compressed form.
pub fn scalar_mult(scalar: &Scalar, point: &RistrettoPoint) -> [u8; POINT_BYTES] {
    (scalar * point).compress().to_bytes()
}

/// Generate a fresh random OPRF secret scalar, bytes suitable for storage.
pub fn generate_secret_key() -> [u8; SCALAR_BYTES] {
    let mut bytes = [0u8; SCALAR_BYTES];
    OsRng.fill_bytes(&mut bytes);
    bytes
}
