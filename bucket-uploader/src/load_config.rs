//! `load_config` module: loads the static YAML uploader config and applies environment overrides.
//!
//! # Responsibilities
//! - Parse the user-supplied YAML file into [`UploaderConfig`]
//! - Let `BUCKET_URL` (from the environment or a `.env` file) replace the configured bucket
//! - Reject configs without a usable bucket URL with a clear message
//!
//! # Errors
//! All errors use `anyhow::Error` and are surfaced at the CLI boundary.
//!
//! Example:
//! ```yaml
//! bucket: https://example.org/api/files/3f1c0a
//! timeout_secs: 30
//! default_mime_type: application/octet-stream
//! ```
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

/// Environment variable overriding the configured bucket URL.
pub const BUCKET_URL_ENV: &str = "BUCKET_URL";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UploaderConfig {
    /// Base URL files are PUT under (`<bucket>/<key>`).
    #[serde(default)]
    pub bucket: String,
    /// Per-request timeout handed to the HTTP client.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// MIME type used when none can be guessed from the file name.
    #[serde(default)]
    pub default_mime_type: Option<String>,
}

impl UploaderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<UploaderConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: UploaderConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(bucket) = std::env::var(BUCKET_URL_ENV) {
        if !bucket.trim().is_empty() {
            info!(env = BUCKET_URL_ENV, "Bucket URL overridden from environment");
            config.bucket = bucket;
        }
    }

    config.bucket = config.bucket.trim().trim_end_matches('/').to_string();
    if config.bucket.is_empty() {
        error!(config_path = ?path_ref, "No bucket URL configured");
        return Err(anyhow::anyhow!(
            "No bucket URL configured: set `bucket` in {:?} or {}",
            path_ref,
            BUCKET_URL_ENV
        ));
    }

    Ok(config)
}
