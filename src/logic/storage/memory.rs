//! In-memory storage backend

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

use super::{blob_size, Storage};
use crate::error::StorageError;

/// HashMap-backed storage. The optional quota bounds the total serialized
/// size of all blobs, like a browser origin's storage budget.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blobs: RwLock<HashMap<String, Value>>,
    quota_bytes: RwLock<Option<usize>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            quota_bytes: RwLock::new(Some(quota_bytes)),
        }
    }

    /// Change the quota of a live store (`None` = unlimited)
    pub fn set_quota(&self, quota_bytes: Option<usize>) {
        *self.quota_bytes.write() = quota_bytes;
    }

    /// Total serialized size of all blobs
    pub fn bytes_used(&self) -> usize {
        self.blobs
            .read()
            .values()
            .map(|v| blob_size(v).unwrap_or(0))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.blobs.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let mut blobs = self.blobs.write();

        if let Some(limit) = *self.quota_bytes.read() {
            let size = blob_size(value)?;
            let others: usize = blobs
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| blob_size(v).unwrap_or(0))
                .sum();

            if others + size > limit {
                return Err(StorageError::CapacityExceeded {
                    key: key.to_string(),
                    size: others + size,
                    limit,
                });
            }
        }

        blobs.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.blobs.write().remove(key);
        Ok(())
    }
}
