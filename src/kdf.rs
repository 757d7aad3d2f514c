//! Key derivation and non-cryptographic-identity hashing.
//!
//! `hash32` defaults to BLAKE2b (truncated to 32 bytes internally by the
//! `blake2` crate's `Blake2b<U32>` alias) with a SHA-256 fallback kept for
//! callers that need a FIPS-shaped primitive; `kdf` is HKDF-SHA256, matching
//! the original key-derivation call shape (ikm, info, salt, out-len).

use blake2::Blake2bVar;
use blake2::digest::{Update, VariableOutput};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};

pub const HASH_BYTES: usize = 32;

/// BLAKE2b, output truncated to 32 bytes.
pub fn hash32_blake2b(data: &[u8]) -> [u8; HASH_BYTES] {
    let mut hasher = Blake2bVar::new(HASH_BYTES).expect("32 is a valid Blake2b output length");
    hasher.update(data);
    let mut out = [0u8; HASH_BYTES];
    hasher.finalize_variable(&mut out).expect("fixed-size output buffer");
    out
}

/// SHA-256, already 32 bytes.
pub fn hash32_sha256(data: &[u8]) -> [u8; HASH_BYTES] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; HASH_BYTES];
    out.copy_from_slice(&digest);
    out
}

/// Default `hash32` primitive (BLAKE2b).
pub fn hash32(data: &[u8]) -> [u8; HASH_BYTES] {
    hash32_blake2b(data)
}

/// Concatenate a slice of byte slices; used to build hash/HKDF inputs
/// without extra allocation churn at call sites.
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|p| p.len()).sum());
    for p in parts {
        out.extend_from_slice(p);
    }
    out
}

/// HKDF-SHA256 derivation: `okm = HKDF-Expand(HKDF-Extract(salt, ikm), info, len)`.
pub fn kdf(ikm: &[u8], info: &[u8], salt: Option<&[u8]>, len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .expect("len is far below HKDF-SHA256's 255*32 byte limit");
    okm
}
