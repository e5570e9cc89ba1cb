//! File storage backend - one pretty-printed JSON file per key

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::Storage;
use crate::constants;
use crate::error::StorageError;

/// Directory-backed storage
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_dir: PathBuf,
    quota_bytes: Option<usize>,
}

impl FileStorage {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            quota_bytes: None,
        }
    }

    /// Storage under the default data directory
    pub fn open_default() -> Self {
        Self::new(constants::get_data_dir())
    }

    /// Limit the size of any single blob
    pub fn with_quota(mut self, quota_bytes: Option<usize>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{}.json", safe))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn set(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(value)?;

        if let Some(limit) = self.quota_bytes {
            if json.len() > limit {
                return Err(StorageError::CapacityExceeded {
                    key: key.to_string(),
                    size: json.len(),
                    limit,
                });
            }
        }

        fs::create_dir_all(&self.base_dir)?;

        // Write-then-rename so a crash never leaves a truncated blob
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
