//! Pattern registry: candidate storage layouts per logical dataset.
//!
//! Candidates are ordered from most specific to most general; discovery tries
//! them in that order and keeps the first one that holds rows. The registry is
//! plain data: it can be built in code, loaded from TOML, or merged from both.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Names of the datasets in the built-in crypto registry.
pub const MARKET_DATASET: &str = "bitcoin_market_data";
pub const NEWS_DATASET: &str = "crypto_news_data";

/// Errors from loading or editing a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse registry TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate dataset name '{0}'")]
    DuplicateDataset(String),
}

/// A named dataset and the storage patterns it may live under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalDataset {
    pub name: String,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl LogicalDataset {
    pub fn new<I, S>(name: &str, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.to_string(),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered collection of logical datasets, unique by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRegistry {
    #[serde(default)]
    datasets: Vec<LogicalDataset>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry from a TOML file with `[[datasets]]` tables.
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse a registry from TOML. Dataset names must be unique.
    pub fn from_toml(content: &str) -> Result<Self, RegistryError> {
        let parsed: PatternRegistry = toml::from_str(content)?;
        let mut registry = PatternRegistry::new();
        for dataset in parsed.datasets {
            registry.add(dataset)?;
        }
        Ok(registry)
    }

    /// The built-in registry for the crypto market and news tables in `bucket`.
    pub fn crypto_defaults(bucket: &str) -> Self {
        let mut registry = PatternRegistry::new();
        for name in [MARKET_DATASET, NEWS_DATASET] {
            registry.upsert(LogicalDataset::new(name, default_layouts(bucket, name)));
        }
        registry
    }

    /// Add a dataset, rejecting duplicate names.
    pub fn add(&mut self, dataset: LogicalDataset) -> Result<(), RegistryError> {
        if self.get(&dataset.name).is_some() {
            return Err(RegistryError::DuplicateDataset(dataset.name));
        }
        self.datasets.push(dataset);
        Ok(())
    }

    /// Replace a dataset with the same name in place, or append it.
    pub fn upsert(&mut self, dataset: LogicalDataset) {
        match self.datasets.iter_mut().find(|d| d.name == dataset.name) {
            Some(existing) => *existing = dataset,
            None => self.datasets.push(dataset),
        }
    }

    /// Overlay another registry on this one (entries in `other` win).
    pub fn merge(&mut self, other: PatternRegistry) {
        for dataset in other.datasets {
            self.upsert(dataset);
        }
    }

    pub fn get(&self, name: &str) -> Option<&LogicalDataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    /// Candidate patterns for `name`, in priority order. Unknown names have none.
    pub fn candidates(&self, name: &str) -> &[String] {
        self.get(name).map(|d| d.patterns.as_slice()).unwrap_or(&[])
    }

    pub fn names(&self) -> Vec<&str> {
        self.datasets.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn datasets(&self) -> &[LogicalDataset] {
        &self.datasets
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// True if any candidate addresses remote object storage.
    pub fn uses_object_storage(&self) -> bool {
        self.datasets
            .iter()
            .flat_map(|d| d.patterns.iter())
            .any(|p| p.contains("://") && !p.starts_with("file://"))
    }

    /// Serialize the registry to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Candidate layouts for a table written by the ingest sink, most specific first.
fn default_layouts(bucket: &str, name: &str) -> Vec<String> {
    vec![
        format!("s3://{bucket}/{name}/data/*.parquet"),
        format!("s3://{bucket}/{name}/**/*.parquet"),
        format!("s3://{bucket}/warehouse/{name}/**/*.parquet"),
        format!("s3://{bucket}/**/{name}/**/*.parquet"),
    ]
}
