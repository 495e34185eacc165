//! Upload and file storage configuration.

use serde::Deserialize;

/// File storage configuration for chunked uploads and study materials.
///
/// Assembled files live under `<data_dir>/files`; in-flight upload chunks
/// are staged under `<data_dir>/tmp/<upload_id>`.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for stored files and upload staging.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Maximum declared size of a single upload (default: 64 MiB).
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Maximum size of a single chunk body (default: 1 MiB).
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: u64,

    /// Seconds an incomplete upload session may sit idle before the
    /// reaper deletes it (default: 3600).
    #[serde(default = "default_upload_ttl_secs")]
    pub upload_ttl_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            max_chunk_bytes: default_max_chunk_bytes(),
            upload_ttl_secs: default_upload_ttl_secs(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_max_upload_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_max_chunk_bytes() -> u64 {
    1024 * 1024
}

fn default_upload_ttl_secs() -> u64 {
    3600
}
