use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::AppError;
use crate::store::BlobStore;

/// Process-local store. Default for tests and for running without DATA_DIR.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))?;
        Ok(blobs.get(key).cloned())
    }

    fn set(&self, key: &str, blob: &str) -> Result<(), AppError> {
        let mut blobs = self
            .blobs
            .lock()
            .map_err(|_| AppError::Internal("store lock poisoned".to_string()))?;
        blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}
