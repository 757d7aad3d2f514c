//! File Envelope Engine (C2): assemble and tear down ZKIM containers.

use std::sync::Arc;

use base64::Engine;
use uuid::Uuid;

use crate::aead::{KEY_BYTES, NONCE_BYTES};
use crate::blob::BlobStore;
use crate::compress;
use crate::error::EnvelopeError;
use crate::kdf;
use crate::kernel::CryptoKernel;
use crate::types::{
    CompressionType, EncryptionType, FieldValue, FileMetadata, HashType, SignatureType, ZkimFile,
    ZkimFileChunk, ZkimFileHeader, DEFAULT_CHUNK_SIZE, VERSION,
};
use crate::wire;

const CONTENT_KEY_FIELD: &str = "contentKey";

/// Outcome of [`EnvelopeEngine::create_zkim_file`].
pub struct CreatedFile {
    pub file: ZkimFile,
    pub object_id: String,
}

pub struct EnvelopeEngine {
    kernel: Arc<CryptoKernel>,
    blob_store: Option<Arc<dyn BlobStore>>,
    chunk_size: usize,
}

impl EnvelopeEngine {
    pub fn new(kernel: Arc<CryptoKernel>, blob_store: Option<Arc<dyn BlobStore>>) -> Self {
        Self {
            kernel,
            blob_store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// `createZkimFile` (§4.2). Persists under a freshly generated object id.
    pub fn create_zkim_file(
        &self,
        content: &[u8],
        platform_key_id: &str,
        platform_key: &[u8; KEY_BYTES],
        user_key: &[u8; KEY_BYTES],
        metadata: FileMetadata,
        created_at: u64,
    ) -> Result<CreatedFile, EnvelopeError> {
        let (file_id, file) =
            self.build_zkim_file(content, platform_key_id, platform_key, user_key, metadata, created_at)?;
        self.store(&file_id, &file)?;
        Ok(CreatedFile { file, object_id: file_id })
    }

    /// `createZkimFile` variant that persists under a caller-supplied
    /// object id instead of a freshly generated one (§4.3.9: the search
    /// index's auto-save persists its snapshot under a well-known
    /// `zkimObjectId` per user, not a random id). The file's internal
    /// `fileId` — used for kernel key-cache lookups — is still freshly
    /// generated; only the blob-store key changes.
    pub fn create_zkim_file_at(
        &self,
        object_id: &str,
        content: &[u8],
        platform_key_id: &str,
        platform_key: &[u8; KEY_BYTES],
        user_key: &[u8; KEY_BYTES],
        metadata: FileMetadata,
        created_at: u64,
    ) -> Result<ZkimFile, EnvelopeError> {
        let (_file_id, file) =
            self.build_zkim_file(content, platform_key_id, platform_key, user_key, metadata, created_at)?;
        self.store(object_id, &file)?;
        Ok(file)
    }

    fn build_zkim_file(
        &self,
        content: &[u8],
        platform_key_id: &str,
        platform_key: &[u8; KEY_BYTES],
        user_key: &[u8; KEY_BYTES],
        mut metadata: FileMetadata,
        created_at: u64,
    ) -> Result<(String, ZkimFile), EnvelopeError> {
        let file_id = Uuid::new_v4().to_string();
        let user_id = metadata.user_id.clone();

        let metadata_hash = kdf::hash32(
            serde_json::to_vec(&metadata)
                .map_err(|e| EnvelopeError::Serialization(e.to_string()))?
                .as_slice(),
        );

        let layered = self.kernel.encrypt_layers(
            &file_id,
            platform_key,
            user_key,
            metadata_hash,
            created_at,
        )?;

        let chunks = self.encrypt_chunks(content, &layered.content_key, &layered.nonces[2])?;
        let total_size: u64 = chunks.iter().map(|c| c.chunk_size as u64).sum();

        metadata.custom_fields.insert(
            CONTENT_KEY_FIELD.to_string(),
            FieldValue::Str(base64::engine::general_purpose::STANDARD.encode(layered.content_key)),
        );

        let header = ZkimFileHeader {
            version: VERSION,
            flags: 0,
            platform_key_id: platform_key_id.to_string(),
            user_id,
            file_id: file_id.clone(),
            created_at,
            chunk_count: chunks.len() as u32,
            total_size,
            compression: CompressionType::Zstd,
            encryption: EncryptionType::XChaCha20Poly1305,
            hash: HashType::Blake2b,
            signature: SignatureType::None,
        };

        let file = ZkimFile {
            header,
            chunks,
            metadata,
            platform_encrypted: layered.platform_encrypted,
            user_encrypted: layered.user_encrypted,
            platform_signature: [0u8; 64],
            user_signature: [0u8; 64],
            content_signature: [0u8; 64],
        };

        Ok((file_id, file))
    }

    fn store(&self, object_id: &str, file: &ZkimFile) -> Result<(), EnvelopeError> {
        if let Some(store) = &self.blob_store {
            let bytes = wire::encode_zkim_file(file)?;
            store.put(object_id, &bytes)?;
        }
        Ok(())
    }

    fn encrypt_chunks(
        &self,
        content: &[u8],
        content_key: &[u8; KEY_BYTES],
        n2: &[u8; NONCE_BYTES],
    ) -> Result<Vec<ZkimFileChunk>, EnvelopeError> {
        let mut chunks = Vec::new();
        let plain_chunks: Vec<&[u8]> = if content.is_empty() {
            vec![&content[..]]
        } else {
            content.chunks(self.chunk_size).collect()
        };

        for (index, plain) in plain_chunks.into_iter().enumerate() {
            let compressed = compress::compress(plain);
            let (encrypted_data, nonce) =
                CryptoKernel::encrypt_chunk(content_key, n2, index as u32, &compressed)?;
            let integrity_hash = kdf::hash32(&encrypted_data);
            chunks.push(ZkimFileChunk {
                index: index as u32,
                chunk_size: plain.len() as u32,
                compressed_size: compressed.len() as u32,
                encrypted_size: encrypted_data.len() as u32,
                nonce,
                encrypted_data,
                integrity_hash,
                padding: Vec::new(),
            });
        }
        Ok(chunks)
    }

    /// `decryptZkimFile` (§4.2). Uses the fast-path `customFields.contentKey`
    /// when present; otherwise recovers it via the user layer.
    pub fn decrypt_zkim_file(
        &self,
        file: &ZkimFile,
        user_key: &[u8; KEY_BYTES],
    ) -> Result<Vec<u8>, EnvelopeError> {
        file.validate()?;

        let content_key = match file.metadata.custom_fields.get(CONTENT_KEY_FIELD).and_then(FieldValue::as_str) {
            Some(encoded) => {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|_| EnvelopeError::Corruption)?;
                if bytes.len() != KEY_BYTES {
                    return Err(EnvelopeError::Corruption);
                }
                let mut key = [0u8; KEY_BYTES];
                key.copy_from_slice(&bytes);
                key
            }
            None => self
                .kernel
                .decrypt_user_layer(&file.header.file_id, user_key, &file.user_encrypted)?,
        };

        let mut output = Vec::with_capacity(file.header.total_size as usize);
        let mut ordered = file.chunks.clone();
        ordered.sort_by_key(|c| c.index);

        for chunk in &ordered {
            let expected_hash = kdf::hash32(&chunk.encrypted_data);
            if expected_hash != chunk.integrity_hash {
                return Err(EnvelopeError::Integrity);
            }
            let compressed = CryptoKernel::decrypt_chunk(
                &content_key,
                &chunk.nonce,
                chunk.index,
                &chunk.encrypted_data,
            )?;
            let plain = compress::decompress(&compressed, chunk.chunk_size as usize)?;
            output.extend_from_slice(&plain);
        }

        if output.len() as u64 != file.header.total_size {
            return Err(EnvelopeError::Corruption);
        }

        Ok(output)
    }

    /// `getZkimFile` (§4.2): blob-store lookup plus wire decode.
    pub fn get_zkim_file(&self, object_id: &str) -> Result<ZkimFile, EnvelopeError> {
        let store = self.blob_store.as_ref().ok_or(EnvelopeError::NotFound)?;
        let bytes = store.get(object_id)?;
        wire::decode_zkim_file(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::InMemoryBlobStore;
    use std::collections::HashMap;

    fn metadata(name: &str, user_id: &str) -> FileMetadata {
        FileMetadata {
            file_name: name.to_string(),
            user_id: user_id.to_string(),
            mime_type: Some("text/plain".to_string()),
            created_at: 1_700_000_000_000,
            tags: vec!["important".into(), "test".into()],
            custom_fields: HashMap::new(),
            access_control: None,
        }
    }

    fn engine() -> EnvelopeEngine {
        let kernel = Arc::new(CryptoKernel::default());
        let store: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        EnvelopeEngine::new(kernel, Some(store))
    }

    #[test]
    fn s1_small_file_roundtrip() {
        let engine = engine();
        let platform_key = [1u8; KEY_BYTES];
        let user_key = [2u8; KEY_BYTES];

        let created = engine
            .create_zkim_file(
                b"Hello, World!",
                "platform-1",
                &platform_key,
                &user_key,
                metadata("hello.txt", "user-1"),
                1_700_000_000_000,
            )
            .unwrap();

        assert_eq!(created.file.header.chunk_count, 1);
        let plaintext = engine.decrypt_zkim_file(&created.file, &user_key).unwrap();
        assert_eq!(plaintext, b"Hello, World!");
    }

    #[test]
    fn s6_large_file_splits_into_multiple_chunks() {
        let engine = engine().with_chunk_size(DEFAULT_CHUNK_SIZE);
        let content = vec![0x5au8; 600 * 1024];
        let platform_key = [1u8; KEY_BYTES];
        let user_key = [2u8; KEY_BYTES];

        let created = engine
            .create_zkim_file(
                &content,
                "platform-1",
                &platform_key,
                &user_key,
                metadata("big.bin", "user-1"),
                1_700_000_000_000,
            )
            .unwrap();

        assert!(created.file.chunks.len() > 1);
        let plaintext = engine.decrypt_zkim_file(&created.file, &user_key).unwrap();
        assert_eq!(plaintext, content);
    }

    #[test]
    fn wrong_key_without_content_key_fails() {
        let engine = engine();
        let platform_key = [1u8; KEY_BYTES];
        let user_key = [2u8; KEY_BYTES];

        let mut created = engine
            .create_zkim_file(
                b"secret",
                "platform-1",
                &platform_key,
                &user_key,
                metadata("f.txt", "user-1"),
                0,
            )
            .unwrap();

        created.file.metadata.custom_fields.remove(CONTENT_KEY_FIELD);
        engine.kernel.forget(&created.file.header.file_id);

        let result = engine.decrypt_zkim_file(&created.file, &[9u8; KEY_BYTES]);
        assert!(result.is_err());
    }

    #[test]
    fn wire_roundtrip_through_blob_store() {
        let engine = engine();
        let platform_key = [1u8; KEY_BYTES];
        let user_key = [2u8; KEY_BYTES];

        let created = engine
            .create_zkim_file(
                b"roundtrip via blob store",
                "platform-1",
                &platform_key,
                &user_key,
                metadata("r.txt", "user-1"),
                0,
            )
            .unwrap();

        let fetched = engine.get_zkim_file(&created.object_id).unwrap();
        let plaintext = engine.decrypt_zkim_file(&fetched, &user_key).unwrap();
        assert_eq!(plaintext, b"roundtrip via blob store");
    }
}
