//! # zkim-crypto
//!
//! Three-layer authenticated encryption and container format for ZKIM files.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use zkim_crypto::blob::{BlobStore, InMemoryBlobStore};
//! use zkim_crypto::envelope::EnvelopeEngine;
//! use zkim_crypto::kernel::CryptoKernel;
//! use zkim_crypto::types::FileMetadata;
//!
//! let kernel = Arc::new(CryptoKernel::default());
//! let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
//! let engine = EnvelopeEngine::new(kernel, Some(store));
//!
//! let metadata = FileMetadata {
//!     file_name: "hello.txt".into(),
//!     user_id: "user-1".into(),
//!     mime_type: Some("text/plain".into()),
//!     created_at: 0,
//!     tags: vec![],
//!     custom_fields: HashMap::new(),
//!     access_control: None,
//! };
//!
//! let created = engine
//!     .create_zkim_file(b"secret", "platform-1", &[1u8; 32], &[2u8; 32], metadata, 0)
//!     .unwrap();
//! let plaintext = engine.decrypt_zkim_file(&created.file, &[2u8; 32]).unwrap();
//! assert_eq!(plaintext, b"secret");
//! ```
//!
//! ## Security Properties
//!
//! - **Three independent key layers**: platform, user, content — each with
//!   its own nonce, none derivable from another.
//! - **Per-chunk nonces**: deterministically derived from the content nonce
//!   and chunk index, never reused within a file.
//! - **Uniform decryption errors**: AEAD failures at any layer present as
//!   the same [`error::EnvelopeError::Decryption`] variant.
//!
//! ## What's NOT Provided
//!
//! - Searchable indexing (see the companion `zkim-search` crate).
//! - Access-control enforcement beyond the bytes recorded on file metadata.
//! - An object-storage backend beyond the bundled in-memory/file stores.

#![deny(unsafe_code)]

pub mod aead;
pub mod blob;
pub mod compress;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod kernel;
pub mod oprf;
pub mod types;
pub mod wire;

pub use blob::{BlobStore, FileBlobStore, InMemoryBlobStore};
pub use envelope::{CreatedFile, EnvelopeEngine};
pub use error::{EncodingError, EnvelopeError};
pub use kernel::{CryptoKernel, KernelConfig, LayeredCiphertext};
pub use types::{
    AccessControl, CompressionType, EncryptionType, FieldValue, FileMetadata, HashType,
    SignatureType, ZkimFile, ZkimFileChunk, ZkimFileHeader, DEFAULT_CHUNK_SIZE, VERSION,
};
