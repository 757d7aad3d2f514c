//! Crypto Kernel: primitives plus the three-layer file encryption algorithm.
//!
//! A [`CryptoKernel`] is stateless with respect to its AEAD/KDF primitives
//! but owns two small caches that the three-layer algorithm depends on: the
//! per-file content key (populated on encrypt, consulted on decrypt/rotate)
//! and an optional decryption-failure streak used by compromise detection.

use std::collections::HashMap;
use std::sync::Mutex;

use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::aead::{self, KEY_BYTES, NONCE_BYTES};
use crate::error::EnvelopeError;
use crate::kdf::{self, concat};

/// Per-file output of [`CryptoKernel::encrypt_layers`].
pub struct LayeredCiphertext {
    pub platform_encrypted: Vec<u8>,
    pub user_encrypted: Vec<u8>,
    pub content_encrypted: Vec<u8>,
    pub content_key: [u8; KEY_BYTES],
    pub nonces: [[u8; NONCE_BYTES]; 3],
}

#[derive(Serialize, Deserialize)]
struct UserPayload {
    file_id: String,
    content_key: [u8; KEY_BYTES],
    metadata_hash: [u8; 32],
}

#[derive(Serialize, Deserialize)]
struct PlatformPayload {
    file_id: String,
    user_encrypted_hash: [u8; 32],
    created_at: u64,
}

/// Configuration toggling optional kernel behaviors that are disabled by
/// default per §4.1 (key rotation, compromise detection).
#[derive(Clone, Debug)]
pub struct KernelConfig {
    pub enable_key_rotation: bool,
    pub enable_compromise_detection: bool,
    pub compromise_failure_threshold: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            enable_key_rotation: false,
            enable_compromise_detection: false,
            compromise_failure_threshold: 3,
        }
    }
}

pub struct CryptoKernel {
    config: KernelConfig,
    content_keys: Mutex<HashMap<String, [u8; KEY_BYTES]>>,
    failure_streaks: Mutex<HashMap<String, u32>>,
}

impl Default for CryptoKernel {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}

impl CryptoKernel {
    pub fn new(config: KernelConfig) -> Self {
        Self {
            config,
            content_keys: Mutex::new(HashMap::new()),
            failure_streaks: Mutex::new(HashMap::new()),
        }
    }

    pub fn rand_bytes(n: usize) -> Vec<u8> {
        let mut buf = vec![0u8; n];
        OsRng.fill_bytes(&mut buf);
        buf
    }

    fn fresh_nonce() -> [u8; NONCE_BYTES] {
        aead::nonce()
    }

    /// Three-layer encryption (§4.1). `metadata_hash` lets callers bind the
    /// user layer to a specific metadata snapshot without re-serializing it
    /// here; the file envelope engine computes it over the canonical trailer.
    pub fn encrypt_layers(
        &self,
        file_id: &str,
        platform_key: &[u8; KEY_BYTES],
        user_key: &[u8; KEY_BYTES],
        metadata_hash: [u8; 32],
        created_at: u64,
    ) -> Result<LayeredCiphertext, EnvelopeError> {
        let mut content_key = [0u8; KEY_BYTES];
        OsRng.fill_bytes(&mut content_key);

        let n0 = Self::fresh_nonce();
        let n1 = Self::fresh_nonce();
        let n2 = Self::fresh_nonce();

        // Layer 3: content placeholder ciphertext (actual file bytes are
        // encrypted chunk-by-chunk by `encrypt_chunk`); this layer exists so
        // the three-layer structure is always present even for zero chunks.
        let content_encrypted = aead::aead_seal(&content_key, &n2, b"", file_id.as_bytes())?;

        let user_payload = UserPayload {
            file_id: file_id.to_string(),
            content_key,
            metadata_hash,
        };
        let user_payload_bytes =
            serde_json::to_vec(&user_payload).map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        let user_ct = aead::aead_seal(user_key, &n1, &user_payload_bytes, file_id.as_bytes())?;
        // The wire trailer has no separate nonce field for this layer, so the
        // nonce travels with the ciphertext: `n1 ‖ aead_ct`.
        let user_encrypted = concat(&[&n1, &user_ct]);

        let platform_payload = PlatformPayload {
            file_id: file_id.to_string(),
            user_encrypted_hash: kdf::hash32(&user_encrypted),
            created_at,
        };
        let platform_payload_bytes = serde_json::to_vec(&platform_payload)
            .map_err(|e| EnvelopeError::Serialization(e.to_string()))?;
        let platform_ct =
            aead::aead_seal(platform_key, &n0, &platform_payload_bytes, file_id.as_bytes())?;
        let platform_encrypted = concat(&[&n0, &platform_ct]);

        self.content_keys.lock().unwrap().insert(file_id.to_string(), content_key);

        Ok(LayeredCiphertext {
            platform_encrypted,
            user_encrypted,
            content_encrypted,
            content_key,
            nonces: [n0, n1, n2],
        })
    }

    /// Recover `contentKey` by decrypting the user layer. `user_encrypted`
    /// is `n1 ‖ aead_ciphertext` as produced by [`Self::encrypt_layers`].
    /// Callers holding `customFields.contentKey` should skip this and use it
    /// directly.
    pub fn decrypt_user_layer(
        &self,
        file_id: &str,
        user_key: &[u8; KEY_BYTES],
        user_encrypted: &[u8],
    ) -> Result<[u8; KEY_BYTES], EnvelopeError> {
        if user_encrypted.len() < NONCE_BYTES {
            return Err(EnvelopeError::Corruption);
        }
        let (nonce_bytes, ct) = user_encrypted.split_at(NONCE_BYTES);
        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(nonce_bytes);
        let plaintext = aead::aead_open(user_key, &nonce, ct, file_id.as_bytes())
            .map_err(|_| self.record_failure(file_id))?;
        let payload: UserPayload =
            serde_json::from_slice(&plaintext).map_err(|_| EnvelopeError::Decryption)?;
        self.content_keys
            .lock()
            .unwrap()
            .insert(file_id.to_string(), payload.content_key);
        Ok(payload.content_key)
    }

    fn record_failure(&self, file_id: &str) -> EnvelopeError {
        if self.config.enable_compromise_detection {
            let mut streaks = self.failure_streaks.lock().unwrap();
            *streaks.entry(file_id.to_string()).or_insert(0) += 1;
        }
        EnvelopeError::Decryption
    }

    /// Opt-in, disabled by default. `true` once the recorded decryption
    /// failure streak for `file_id` reaches the configured threshold.
    pub fn is_compromised(&self, file_id: &str) -> bool {
        if !self.config.enable_compromise_detection {
            return false;
        }
        self.failure_streaks
            .lock()
            .unwrap()
            .get(file_id)
            .copied()
            .unwrap_or(0)
            >= self.config.compromise_failure_threshold
    }

    pub fn cached_content_key(&self, file_id: &str) -> Option<[u8; KEY_BYTES]> {
        self.content_keys.lock().unwrap().get(file_id).copied()
    }

    /// Per-chunk nonce: `hash32(N2 ‖ chunkIndex)[..24]`.
    fn chunk_nonce(n2: &[u8; NONCE_BYTES], chunk_index: u32) -> [u8; NONCE_BYTES] {
        let input = concat(&[n2, &chunk_index.to_le_bytes()]);
        let digest = kdf::hash32(&input);
        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(&digest[..NONCE_BYTES]);
        nonce
    }

    pub fn encrypt_chunk(
        content_key: &[u8; KEY_BYTES],
        n2: &[u8; NONCE_BYTES],
        chunk_index: u32,
        compressed: &[u8],
    ) -> Result<(Vec<u8>, [u8; NONCE_BYTES]), EnvelopeError> {
        let nonce = Self::chunk_nonce(n2, chunk_index);
        let encrypted = aead::aead_seal(content_key, &nonce, compressed, &chunk_index.to_le_bytes())?;
        Ok((encrypted, nonce))
    }

    pub fn decrypt_chunk(
        content_key: &[u8; KEY_BYTES],
        nonce: &[u8; NONCE_BYTES],
        chunk_index: u32,
        encrypted: &[u8],
    ) -> Result<Vec<u8>, EnvelopeError> {
        aead::aead_open(content_key, nonce, encrypted, &chunk_index.to_le_bytes())
            .map_err(|_| EnvelopeError::Decryption)
    }

    /// `rotateKeys`: fails unless rotation is enabled. `newKey =
    /// kdf(oldContentKey, "rotate", fileId, 32)`. Does not re-encrypt
    /// existing chunks — callers are expected to do that with the new key.
    pub fn rotate_keys(&self, file_id: &str) -> Result<[u8; KEY_BYTES], EnvelopeError> {
        if !self.config.enable_key_rotation {
            return Err(EnvelopeError::KeyRotationDisabled);
        }
        let old_key = self
            .content_keys
            .lock()
            .unwrap()
            .get(file_id)
            .copied()
            .ok_or(EnvelopeError::NotFound)?;

        let info = concat(&[b"rotate", file_id.as_bytes()]);
        let derived = kdf::kdf(&old_key, &info, None, KEY_BYTES);
        let mut new_key = [0u8; KEY_BYTES];
        new_key.copy_from_slice(&derived);

        self.content_keys.lock().unwrap().insert(file_id.to_string(), new_key);
        Ok(new_key)
    }

    /// `generateSessionKey(peerId, ephemeralKey) = kdf(ephemeralKey,
    /// "session", peerId, 32)`.
    pub fn generate_session_key(peer_id: &str, ephemeral_key: &[u8]) -> [u8; KEY_BYTES] {
        let info = concat(&[b"session", peer_id.as_bytes()]);
        let derived = kdf::kdf(ephemeral_key, &info, None, KEY_BYTES);
        let mut out = [0u8; KEY_BYTES];
        out.copy_from_slice(&derived);
        out
    }

    pub fn forget(&self, file_id: &str) {
        if let Some(mut key) = self.content_keys.lock().unwrap().remove(file_id) {
            key.zeroize();
        }
        self.failure_streaks.lock().unwrap().remove(file_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; KEY_BYTES] {
        [byte; KEY_BYTES]
    }

    #[test]
    fn three_layer_roundtrip_recovers_content_key() {
        let kernel = CryptoKernel::default();
        let platform_key = key(1);
        let user_key = key(2);
        let meta_hash = [9u8; 32];

        let layered = kernel
            .encrypt_layers("file-1", &platform_key, &user_key, meta_hash, 1_700_000_000_000)
            .unwrap();

        let recovered = kernel
            .decrypt_user_layer("file-1", &user_key, &layered.user_encrypted)
            .unwrap();
        assert_eq!(recovered, layered.content_key);
    }

    #[test]
    fn wrong_user_key_fails() {
        let kernel = CryptoKernel::default();
        let layered = kernel
            .encrypt_layers("file-1", &key(1), &key(2), [0u8; 32], 0)
            .unwrap();
        let result = kernel.decrypt_user_layer("file-1", &key(99), &layered.user_encrypted);
        assert!(result.is_err());
    }

    #[test]
    fn chunk_roundtrip() {
        let content_key = key(5);
        let n2 = aead::nonce();
        let (encrypted, nonce) = CryptoKernel::encrypt_chunk(&content_key, &n2, 0, b"hello chunk").unwrap();
        let plaintext = CryptoKernel::decrypt_chunk(&content_key, &nonce, 0, &encrypted).unwrap();
        assert_eq!(plaintext, b"hello chunk");
    }

    #[test]
    fn chunk_nonces_differ_by_index() {
        let n2 = aead::nonce();
        let nonce0 = CryptoKernel::chunk_nonce(&n2, 0);
        let nonce1 = CryptoKernel::chunk_nonce(&n2, 1);
        assert_ne!(nonce0, nonce1);
    }

    #[test]
    fn rotate_keys_disabled_by_default() {
        let kernel = CryptoKernel::default();
        kernel.encrypt_layers("file-1", &key(1), &key(2), [0u8; 32], 0).unwrap();
        assert!(matches!(
            kernel.rotate_keys("file-1"),
            Err(EnvelopeError::KeyRotationDisabled)
        ));
    }

    #[test]
    fn rotate_keys_when_enabled_changes_cached_key() {
        let kernel = CryptoKernel::new(KernelConfig {
            enable_key_rotation: true,
            ..KernelConfig::default()
        });
        let layered = kernel.encrypt_layers("file-1", &key(1), &key(2), [0u8; 32], 0).unwrap();
        let rotated = kernel.rotate_keys("file-1").unwrap();
        assert_ne!(rotated, layered.content_key);
        assert_eq!(kernel.cached_content_key("file-1"), Some(rotated));
    }

    #[test]
    fn session_key_is_deterministic() {
        let a = CryptoKernel::generate_session_key("peer-1", b"ephemeral");
        let b = CryptoKernel::generate_session_key("peer-1", b"ephemeral");
        assert_eq!(a, b);
    }

    #[test]
    fn compromise_detection_disabled_by_default() {
        let kernel = CryptoKernel::default();
        kernel.encrypt_layers("file-1", &key(1), &key(2), [0u8; 32], 0).unwrap();
        for _ in 0..10 {
            let mut garbage = aead::nonce().to_vec();
            garbage.extend_from_slice(b"garbage");
            let _ = kernel.decrypt_user_layer("file-1", &key(99), &garbage);
        }
        assert!(!kernel.is_compromised("file-1"));
    }

    #[test]
    fn compromise_detection_trips_after_threshold() {
        let kernel = CryptoKernel::new(KernelConfig {
            enable_compromise_detection: true,
            compromise_failure_threshold: 2,
            ..KernelConfig::default()
        });
        let layered = kernel.encrypt_layers("file-1", &key(1), &key(2), [0u8; 32], 0).unwrap();
        assert!(!kernel.is_compromised("file-1"));
        let _ = kernel.decrypt_user_layer("file-1", &key(99), &layered.user_encrypted);
        let _ = kernel.decrypt_user_layer("file-1", &key(99), &layered.user_encrypted);
        assert!(kernel.is_compromised("file-1"));
    }
}
