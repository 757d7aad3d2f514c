//! Unified error types for the crypto kernel and file envelope engine.

use std::fmt;

/// Failure surfaced by the crypto kernel or file envelope engine.
///
/// Mirrors the error-kind taxonomy: AEAD/oracle failures collapse into
/// [`EnvelopeError::Decryption`] so callers never learn *which* layer
/// rejected a ciphertext, while corruption and rotation failures stay
/// distinguishable because callers are expected to branch on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// AEAD verification failed at some layer, or the recovered plaintext
    /// did not parse. Deliberately uninformative about which layer failed.
    Decryption,
    /// A chunk's `integrityHash` did not match its ciphertext.
    Integrity,
    /// Decompression failed or decoded length did not match the header.
    Corruption,
    /// `rotateKeys` called without rotation enabled.
    KeyRotationDisabled,
    /// The requested object does not exist in the blob store.
    NotFound,
    /// Canonical-JSON (de)serialization of the trailer metadata failed.
    Serialization(String),
    /// Underlying blob store I/O failure.
    Storage(String),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decryption => write!(f, "decryption failed"),
            Self::Integrity => write!(f, "integrity check failed"),
            Self::Corruption => write!(f, "file corruption detected"),
            Self::KeyRotationDisabled => write!(f, "key rotation is disabled"),
            Self::NotFound => write!(f, "object not found"),
            Self::Serialization(msg) => write!(f, "serialization error: {}", msg),
            Self::Storage(msg) => write!(f, "storage error: {}", msg),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// Internal encode/decode failure, normalized into [`EnvelopeError::Decryption`]
/// or [`EnvelopeError::Corruption`] at the call site (oracle discipline: a
/// malformed wire buffer must not present differently than a bad key).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingError;

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error")
    }
}

impl std::error::Error for EncodingError {}

impl From<EncodingError> for EnvelopeError {
    fn from(_: EncodingError) -> Self {
        EnvelopeError::Corruption
    }
}
