//! Configuration module

use std::env;
use std::path::PathBuf;

use crate::constants::{self, DEFAULT_LEDGER_CAPACITY};

/// Application configuration
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Directory holding the JSON blobs (thresholds, attempts, experiments)
    pub data_dir: PathBuf,

    /// Maximum attempts kept by the ledger
    pub ledger_capacity: usize,

    /// Optional per-blob size limit in bytes (simulates a storage quota)
    pub storage_quota_bytes: Option<usize>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            data_dir: constants::get_data_dir(),
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            storage_quota_bytes: None,
        }
    }
}

impl GuardConfig {
    /// Load configuration from environment variables (and `.env` if present)
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env file loaded: {}", e);
        }

        Self {
            data_dir: constants::get_data_dir(),

            ledger_capacity: env::var("BOTGUARD_LEDGER_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .filter(|c: &usize| *c > 0)
                .unwrap_or(DEFAULT_LEDGER_CAPACITY),

            storage_quota_bytes: env::var("BOTGUARD_STORAGE_QUOTA_BYTES")
                .ok()
                .and_then(|q| q.parse().ok()),
        }
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }
}
