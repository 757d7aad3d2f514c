//! Blob store contract: `put`/`get`/`delete` keyed by opaque object id.
//!
//! Shape follows the storage-backend trait pattern closely: a trait plus an
//! in-memory backend (testing) and a file backend (development), both
//! `Send + Sync` so they can sit behind an `Arc` shared across async tasks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::error::EnvelopeError;

pub trait BlobStore: Send + Sync {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), EnvelopeError>;
    fn get(&self, id: &str) -> Result<Vec<u8>, EnvelopeError>;
    fn delete(&self, id: &str) -> Result<(), EnvelopeError>;
}

/// In-memory blob store (testing and ephemeral use).
#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), EnvelopeError> {
        self.objects.write().unwrap().insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, EnvelopeError> {
        self.objects
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or(EnvelopeError::NotFound)
    }

    fn delete(&self, id: &str) -> Result<(), EnvelopeError> {
        self.objects.write().unwrap().remove(id);
        Ok(())
    }
}

/// File-based blob store (one file per object, atomic write via temp+rename).
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, EnvelopeError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| EnvelopeError::Storage(format!("create dir: {}", e)))?;
        Ok(Self { dir })
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.zkim", id))
    }
}

impl BlobStore for FileBlobStore {
    fn put(&self, id: &str, bytes: &[u8]) -> Result<(), EnvelopeError> {
        let path = self.object_path(id);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| EnvelopeError::Storage(format!("write: {}", e)))?;
        std::fs::rename(&tmp, &path).map_err(|e| EnvelopeError::Storage(format!("rename: {}", e)))?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Vec<u8>, EnvelopeError> {
        let path = self.object_path(id);
        if !path.exists() {
            return Err(EnvelopeError::NotFound);
        }
        std::fs::read(&path).map_err(|e| EnvelopeError::Storage(format!("read: {}", e)))
    }

    fn delete(&self, id: &str) -> Result<(), EnvelopeError> {
        let path = self.object_path(id);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| EnvelopeError::Storage(format!("delete: {}", e)))?;
        }
        Ok(())
    }
}
