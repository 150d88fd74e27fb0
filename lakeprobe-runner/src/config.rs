//! Application configuration loaded from TOML.
//!
//! ```toml
//! [storage]
//! endpoint = "localhost:9000"
//! bucket = "crypto-data"
//!
//! [[datasets]]
//! name = "bitcoin_market_data"
//! patterns = ["s3://crypto-data/bitcoin_market_data/data/*.parquet"]
//!
//! [[report_groups]]
//! name = "Custom"
//! datasets = ["bitcoin_market_data"]
//! [[report_groups.queries]]
//! label = "row count"
//! sql = "SELECT COUNT(*) AS n FROM {bitcoin_market_data}"
//! ```
//!
//! Every section is optional. Command-line and environment overrides are
//! applied on top with [`AppConfig::apply_overrides`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use lakeprobe_core::{LogicalDataset, PatternRegistry, StorageSettings, UrlStyle};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::ReportGroup;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageSettings,
    /// Replace or extend the built-in dataset registry.
    pub datasets: Vec<LogicalDataset>,
    /// Run after the built-in report groups.
    pub report_groups: Vec<ReportGroup>,
}

/// Storage values supplied outside the config file. `None` keeps the file value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageOverrides {
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub use_ssl: Option<bool>,
    pub url_style: Option<UrlStyle>,
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if !seen.insert(dataset.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "dataset '{}' declared twice",
                    dataset.name
                )));
            }
            if dataset.patterns.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "dataset '{}' has no patterns",
                    dataset.name
                )));
            }
        }
        for group in &self.report_groups {
            if group.queries.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "report group '{}' has no queries",
                    group.name
                )));
            }
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: StorageOverrides) {
        let s = &mut self.storage;
        if let Some(v) = overrides.endpoint {
            s.endpoint = v;
        }
        if let Some(v) = overrides.access_key {
            s.access_key = v;
        }
        if let Some(v) = overrides.secret_key {
            s.secret_key = v;
        }
        if let Some(v) = overrides.region {
            s.region = v;
        }
        if let Some(v) = overrides.bucket {
            s.bucket = v;
        }
        if let Some(v) = overrides.use_ssl {
            s.use_ssl = v;
        }
        if let Some(v) = overrides.url_style {
            s.url_style = v;
        }
    }

    /// Built-in layouts for the configured bucket, overlaid with `[[datasets]]`.
    pub fn registry(&self) -> PatternRegistry {
        let mut registry = PatternRegistry::crypto_defaults(&self.storage.bucket);
        for dataset in &self.datasets {
            registry.upsert(dataset.clone());
        }
        registry
    }
}
