//! Configuration management for the prompt studio service
//!
//! Supports loading configuration from environment variables with fallback to defaults.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_PROFILE_COUNT: usize = 4;
pub const DEFAULT_PROMPT_SERVICE_URL: &str = "http://127.0.0.1:3003";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root for the entity snapshot and uploaded files
    pub data_dir: PathBuf,
    pub max_profile_count: usize,
    pub prompt_service_url: String,
    pub prompt_service_timeout: Duration,
    pub index_cache_capacity: usize,
    /// Cap on the buffered size of one multipart form
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PROMPT_STUDIO_DATA_DIR`: Data directory (default: ./data)
    /// - `PROMPT_STUDIO_MAX_PROFILE_COUNT`: Profiles allowed per tool (default: 4)
    /// - `PROMPT_SERVICE_URL`: Base URL of the prompt service (default: http://127.0.0.1:3003)
    /// - `PROMPT_SERVICE_TIMEOUT_SECS`: Prompt service request timeout (default: 300)
    /// - `PROMPT_STUDIO_INDEX_CACHE_CAPACITY`: Indexing state cache entries (default: 1024)
    /// - `PROMPT_STUDIO_MAX_UPLOAD_BYTES`: Multipart form size limit (default: 50 MiB)
    pub fn from_env() -> Self {
        Self {
            data_dir: std::env::var("PROMPT_STUDIO_DATA_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            max_profile_count: std::env::var("PROMPT_STUDIO_MAX_PROFILE_COUNT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_PROFILE_COUNT),
            prompt_service_url: std::env::var("PROMPT_SERVICE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PROMPT_SERVICE_URL.to_string()),
            prompt_service_timeout: Duration::from_secs(
                std::env::var("PROMPT_SERVICE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(300),
            ),
            index_cache_capacity: std::env::var("PROMPT_STUDIO_INDEX_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(1024),
            max_upload_bytes: std::env::var("PROMPT_STUDIO_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        }
    }

    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    pub fn store_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("prompt_studio_store.json")
    }

    pub fn file_root(&self) -> PathBuf {
        self.data_dir.join("files")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_profile_count: DEFAULT_MAX_PROFILE_COUNT,
            prompt_service_url: DEFAULT_PROMPT_SERVICE_URL.to_string(),
            prompt_service_timeout: Duration::from_secs(300),
            index_cache_capacity: 1024,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}
