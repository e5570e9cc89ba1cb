//! Storage Module - Durable key-value blobs
//!
//! Thresholds, attempts and experiments are stored as JSON blobs under named
//! keys. Backends must report `StorageError::CapacityExceeded` distinctly so
//! the ledger can degrade instead of failing.
//!
//! - `memory.rs`: in-process map with an optional total quota
//! - `file.rs`: one JSON file per key under a data directory

pub mod memory;
pub mod file;
#[cfg(test)]
mod tests;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StorageError;

pub use memory::MemoryStorage;
pub use file::FileStorage;

/// Key-value store of JSON blobs
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a typed blob. Missing key -> `Ok(None)`.
pub fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Result<Option<T>, StorageError> {
    match storage.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode and write a typed blob
pub fn save<T: Serialize>(storage: &dyn Storage, key: &str, data: &T) -> Result<(), StorageError> {
    let value = serde_json::to_value(data)?;
    storage.set(key, &value)
}

/// Serialized size of a blob, as counted against quotas
pub(crate) fn blob_size(value: &Value) -> Result<usize, StorageError> {
    Ok(serde_json::to_vec(value)?.len())
}
