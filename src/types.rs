//! ZKIM container data model: header, chunks, trailer, and the algorithm-
//! agility tags carried in the header.

use std::collections::HashMap;
use std::convert::TryFrom;

use serde::{Deserialize, Serialize};

use crate::error::EnvelopeError;

pub const MAGIC: [u8; 4] = *b"ZKIM";
pub const VERSION: u16 = 1;

/// Default chunk size, in plaintext bytes, before compression.
pub const DEFAULT_CHUNK_SIZE: usize = 524_288;

// ---------------------------------------------------------------------------
// Algorithm-agility tags
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompressionType {
    None = 0,
    Zstd = 1,
}

impl TryFrom<u8> for CompressionType {
    type Error = EnvelopeError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Zstd),
            _ => Err(EnvelopeError::Corruption),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionType {
    XChaCha20Poly1305 = 0,
}

impl TryFrom<u8> for EncryptionType {
    type Error = EnvelopeError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::XChaCha20Poly1305),
            _ => Err(EnvelopeError::Corruption),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HashType {
    Blake2b = 0,
    Sha256 = 1,
}

impl TryFrom<u8> for HashType {
    type Error = EnvelopeError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Blake2b),
            1 => Ok(Self::Sha256),
            _ => Err(EnvelopeError::Corruption),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureType {
    /// No detached signature carried (fields are zero-filled but present).
    None = 0,
}

impl TryFrom<u8> for SignatureType {
    type Error = EnvelopeError;
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::None),
            _ => Err(EnvelopeError::Corruption),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

/// A single tagged `customFields` value. Only `Str` participates in token
/// generation and relevance scoring; other variants are carried through
/// unchanged but ignored by the search index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default)]
    pub read_access: Vec<String>,
    #[serde(default)]
    pub write_access: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileMetadata {
    pub file_name: String,
    pub user_id: String,
    pub mime_type: Option<String>,
    pub created_at: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, FieldValue>,
    #[serde(default)]
    pub access_control: Option<AccessControl>,
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ZkimFileHeader {
    pub version: u16,
    pub flags: u32,
    pub platform_key_id: String,
    pub user_id: String,
    pub file_id: String,
    pub created_at: u64,
    pub chunk_count: u32,
    pub total_size: u64,
    pub compression: CompressionType,
    pub encryption: EncryptionType,
    pub hash: HashType,
    pub signature: SignatureType,
}

#[derive(Clone, Debug)]
pub struct ZkimFileChunk {
    pub index: u32,
    pub chunk_size: u32,
    pub compressed_size: u32,
    pub encrypted_size: u32,
    pub nonce: [u8; 24],
    pub encrypted_data: Vec<u8>,
    pub integrity_hash: [u8; 32],
    pub padding: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct ZkimFile {
    pub header: ZkimFileHeader,
    pub chunks: Vec<ZkimFileChunk>,
    pub metadata: FileMetadata,
    pub platform_encrypted: Vec<u8>,
    pub user_encrypted: Vec<u8>,
    pub platform_signature: [u8; 64],
    pub user_signature: [u8; 64],
    pub content_signature: [u8; 64],
}

impl ZkimFile {
    /// §3 invariants, checked defensively after decode and before decrypt.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.header.chunk_count as usize != self.chunks.len() {
            return Err(EnvelopeError::Corruption);
        }
        let total: u64 = self.chunks.iter().map(|c| c.chunk_size as u64).sum();
        if total != self.header.total_size {
            return Err(EnvelopeError::Corruption);
        }
        for chunk in &self.chunks {
            if chunk.compressed_size > chunk.chunk_size {
                return Err(EnvelopeError::Corruption);
            }
        }
        Ok(())
    }
}
