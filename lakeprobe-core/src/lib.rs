//! LakeProbe Core: dataset discovery over object-storage path patterns.
//!
//! This crate holds the pieces every front end shares:
//! - Typed scalars and tabular results returned by the engine
//! - The `QueryExecutor` seam, with a Polars SQL implementation and a
//!   scripted double for tests
//! - The pattern registry (candidate layouts per logical dataset)
//! - The dataset resolver (first candidate with rows wins)
//! - Object-storage connection settings consumed at setup

pub mod engine;
pub mod registry;
pub mod resolver;
pub mod storage;
pub mod value;

pub use engine::{
    run_query, PolarsExecutor, QueryError, QueryExecutor, QueryOutcome, ScriptedExecutor,
};
pub use registry::{
    LogicalDataset, PatternRegistry, RegistryError, MARKET_DATASET, NEWS_DATASET,
};
pub use resolver::{
    BindingSet, DatasetResolver, Probe, ProbeMiss, ResolveOutcome, ResolvedBinding,
};
pub use storage::{StorageError, StorageSettings, UrlStyle};
pub use value::{TabularResult, Value};
