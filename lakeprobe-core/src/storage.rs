//! Object-storage connection settings.
//!
//! These settings never reach the resolver or the analytics code. They are
//! handed to the engine through the standard S3 environment variables before
//! the engine is created, and used once for a reachability check at setup.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "localhost:9000";
pub const DEFAULT_ACCESS_KEY: &str = "minioadmin";
pub const DEFAULT_SECRET_KEY: &str = "minioadmin";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_BUCKET: &str = "crypto-data";

/// Liveness path exposed by MinIO-compatible servers.
const HEALTH_PATH: &str = "/minio/health/live";

/// Errors from storage setup.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage endpoint {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("storage endpoint {endpoint} answered HTTP {status}")]
    Unhealthy { endpoint: String, status: u16 },

    #[error("http client: {0}")]
    Client(String),
}

/// Bucket addressing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStyle {
    /// `http://host/bucket/key`
    #[default]
    Path,
    /// `http://bucket.host/key`
    Virtual,
}

/// Connection settings for the S3-compatible store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `host:port`, optionally with an `http://` or `https://` scheme.
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub use_ssl: bool,
    pub url_style: UrlStyle,
    /// Bucket used to build the default pattern registry.
    pub bucket: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_key: DEFAULT_ACCESS_KEY.to_string(),
            secret_key: DEFAULT_SECRET_KEY.to_string(),
            region: DEFAULT_REGION.to_string(),
            use_ssl: false,
            url_style: UrlStyle::Path,
            bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

impl StorageSettings {
    /// Endpoint as a full URL, adding the scheme implied by `use_ssl`.
    pub fn endpoint_url(&self) -> String {
        let trimmed = self.endpoint.trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if self.use_ssl {
            format!("https://{trimmed}")
        } else {
            format!("http://{trimmed}")
        }
    }

    /// Environment variables the engine's object-store client reads.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("AWS_ENDPOINT_URL", self.endpoint_url()),
            ("AWS_ACCESS_KEY_ID", self.access_key.clone()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_key.clone()),
            ("AWS_REGION", self.region.clone()),
            ("AWS_ALLOW_HTTP", (!self.use_ssl).to_string()),
            (
                "AWS_VIRTUAL_HOSTED_STYLE_REQUEST",
                (self.url_style == UrlStyle::Virtual).to_string(),
            ),
        ]
    }

    /// Export the settings into the process environment.
    ///
    /// Must run before the engine is created and before other threads start.
    pub fn export_env(&self) {
        for (key, value) in self.env_vars() {
            debug!(key, "exporting storage setting");
            std::env::set_var(key, value);
        }
    }

    /// Check that the endpoint answers its liveness probe.
    pub fn check_reachable(&self, timeout: Duration) -> Result<(), StorageError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Client(e.to_string()))?;

        let endpoint = self.endpoint_url();
        let url = format!("{endpoint}{HEALTH_PATH}");
        let resp = client.get(&url).send().map_err(|e| StorageError::Unreachable {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Unhealthy {
                endpoint,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
