//! Dataset resolver: finds which candidate pattern actually holds a dataset.
//!
//! Candidates are probed strictly in registry order with
//! `SELECT COUNT(*) FROM <pattern>`. The first candidate reporting more than
//! zero rows is bound and probing stops; later candidates are never tried,
//! even if they would report more rows. An engine error and a zero count are
//! both misses that advance to the next candidate. They are kept apart in
//! the returned miss list and in the debug log.
//!
//! Bindings live for one run. Once a dataset is bound it is never re-probed.

use crate::engine::QueryExecutor;
use crate::registry::PatternRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// A dataset confirmed to hold rows under a specific pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedBinding {
    pub dataset: String,
    pub pattern: String,
    /// Row count observed when the binding was made.
    pub row_count: u64,
}

/// Why a candidate pattern was not bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeMiss {
    /// The engine read the pattern and counted zero rows.
    Empty,
    /// The engine rejected the pattern or failed while counting.
    Error(String),
}

impl fmt::Display for ProbeMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMiss::Empty => write!(f, "no rows"),
            ProbeMiss::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// One failed probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub pattern: String,
    pub miss: ProbeMiss,
}

/// Result of resolving one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Bound(ResolvedBinding),
    /// Every candidate missed (or there were none).
    NotFound { dataset: String, misses: Vec<Probe> },
}

impl ResolveOutcome {
    pub fn dataset(&self) -> &str {
        match self {
            ResolveOutcome::Bound(b) => &b.dataset,
            ResolveOutcome::NotFound { dataset, .. } => dataset,
        }
    }

    pub fn binding(&self) -> Option<&ResolvedBinding> {
        match self {
            ResolveOutcome::Bound(b) => Some(b),
            ResolveOutcome::NotFound { .. } => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.binding().is_some()
    }
}

/// Bindings accumulated during one run, in resolution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    bindings: Vec<ResolvedBinding>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dataset: &str) -> Option<&ResolvedBinding> {
        self.bindings.iter().find(|b| b.dataset == dataset)
    }

    pub fn contains(&self, dataset: &str) -> bool {
        self.get(dataset).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedBinding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Record a binding. An existing binding for the same dataset is kept.
    pub fn insert(&mut self, binding: ResolvedBinding) -> &ResolvedBinding {
        let idx = match self.bindings.iter().position(|b| b.dataset == binding.dataset) {
            Some(idx) => idx,
            None => {
                self.bindings.push(binding);
                self.bindings.len() - 1
            }
        };
        &self.bindings[idx]
    }
}

impl FromIterator<ResolvedBinding> for BindingSet {
    fn from_iter<T: IntoIterator<Item = ResolvedBinding>>(iter: T) -> Self {
        let mut set = BindingSet::new();
        for binding in iter {
            set.insert(binding);
        }
        set
    }
}

/// The SQL issued to probe a single candidate.
pub fn count_sql(executor: &dyn QueryExecutor, pattern: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", executor.relation(pattern))
}

/// Count the rows behind one pattern. Zero and errors are both misses.
///
/// Some engines answer an ungrouped `COUNT(*)` over empty input with no rows
/// at all; that is read as a zero count.
pub fn probe(executor: &mut dyn QueryExecutor, pattern: &str) -> Result<u64, ProbeMiss> {
    let sql = count_sql(executor, pattern);
    match executor.execute(&sql) {
        Ok(result) if result.is_empty() => Err(ProbeMiss::Empty),
        Ok(result) => match result.count() {
            Some(0) => Err(ProbeMiss::Empty),
            Some(n) => Ok(n),
            None => Err(ProbeMiss::Error(format!(
                "count query returned no integer (columns: {})",
                result.columns.join(", ")
            ))),
        },
        Err(e) => Err(ProbeMiss::Error(e.message)),
    }
}

/// Resolves logical datasets against a registry, caching bindings.
pub struct DatasetResolver<'r> {
    registry: &'r PatternRegistry,
    bindings: BindingSet,
}

impl<'r> DatasetResolver<'r> {
    pub fn new(registry: &'r PatternRegistry) -> Self {
        Self {
            registry,
            bindings: BindingSet::new(),
        }
    }

    pub fn registry(&self) -> &'r PatternRegistry {
        self.registry
    }

    pub fn bindings(&self) -> &BindingSet {
        &self.bindings
    }

    pub fn into_bindings(self) -> BindingSet {
        self.bindings
    }

    /// Resolve one dataset: first candidate with rows wins.
    pub fn resolve(&mut self, executor: &mut dyn QueryExecutor, dataset: &str) -> ResolveOutcome {
        if let Some(existing) = self.bindings.get(dataset) {
            return ResolveOutcome::Bound(existing.clone());
        }

        let registry = self.registry;
        let candidates = registry.candidates(dataset);
        let mut misses = Vec::with_capacity(candidates.len());

        for pattern in candidates {
            match probe(executor, pattern) {
                Ok(row_count) => {
                    info!(dataset, pattern = pattern.as_str(), row_count, "dataset bound");
                    let binding = self
                        .bindings
                        .insert(ResolvedBinding {
                            dataset: dataset.to_string(),
                            pattern: pattern.clone(),
                            row_count,
                        })
                        .clone();
                    if let Err(e) = executor.register(dataset, pattern) {
                        warn!(dataset, error = %e, "could not register binding as a table");
                    }
                    return ResolveOutcome::Bound(binding);
                }
                Err(miss) => {
                    match &miss {
                        ProbeMiss::Empty => {
                            debug!(dataset, pattern = pattern.as_str(), "probe miss: zero rows")
                        }
                        ProbeMiss::Error(msg) => debug!(
                            dataset,
                            pattern = pattern.as_str(),
                            error = msg.as_str(),
                            "probe miss: engine error"
                        ),
                    }
                    misses.push(Probe {
                        pattern: pattern.clone(),
                        miss,
                    });
                }
            }
        }

        info!(dataset, probes = misses.len(), "dataset not found");
        ResolveOutcome::NotFound {
            dataset: dataset.to_string(),
            misses,
        }
    }

    /// Resolve every registered dataset in registry order.
    pub fn resolve_all(&mut self, executor: &mut dyn QueryExecutor) -> Vec<ResolveOutcome> {
        let registry = self.registry;
        registry
            .names()
            .into_iter()
            .map(|name| self.resolve(executor, name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ScriptedExecutor;
    use crate::registry::LogicalDataset;

    fn registry(name: &str, patterns: &[&str]) -> PatternRegistry {
        let mut r = PatternRegistry::new();
        r.upsert(LogicalDataset::new(name, patterns.iter().copied()));
        r
    }

    #[test]
    fn empty_candidate_list_makes_no_engine_call() {
        let r = registry("x", &[]);
        let mut exec = ScriptedExecutor::new();
        let mut resolver = DatasetResolver::new(&r);

        let outcome = resolver.resolve(&mut exec, "x");
        assert_eq!(
            outcome,
            ResolveOutcome::NotFound {
                dataset: "x".into(),
                misses: vec![]
            }
        );
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn unregistered_dataset_is_not_found_without_probing() {
        let r = PatternRegistry::new();
        let mut exec = ScriptedExecutor::new();
        let outcome = DatasetResolver::new(&r).resolve(&mut exec, "ghost");
        assert!(!outcome.is_bound());
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn error_then_count_binds_second_candidate() {
        let r = registry("x", &["a/*.parquet", "b/**/*.parquet"]);
        let mut exec = ScriptedExecutor::new()
            .fail("a/*.parquet", "No such file or directory")
            .respond_count("b/**/*.parquet", 42);
        let mut resolver = DatasetResolver::new(&r);

        let outcome = resolver.resolve(&mut exec, "x");
        assert_eq!(
            outcome.binding(),
            Some(&ResolvedBinding {
                dataset: "x".into(),
                pattern: "b/**/*.parquet".into(),
                row_count: 42,
            })
        );
        assert_eq!(exec.call_count(), 2);
        assert_eq!(exec.calls()[0], "SELECT COUNT(*) FROM 'a/*.parquet'");
    }

    #[test]
    fn first_match_wins_over_larger_later_candidate() {
        let r = registry("x", &["small/*.parquet", "big/*.parquet"]);
        let mut exec = ScriptedExecutor::new()
            .respond_count("small/", 3)
            .respond_count("big/", 1_000_000);
        let outcome = DatasetResolver::new(&r).resolve(&mut exec, "x");

        assert_eq!(outcome.binding().unwrap().pattern, "small/*.parquet");
        assert_eq!(outcome.binding().unwrap().row_count, 3);
        assert_eq!(exec.call_count(), 1);
    }

    #[test]
    fn all_misses_probe_each_candidate_once() {
        let r = registry("x", &["a/*.parquet", "b/*.parquet", "c/*.parquet"]);
        let mut exec = ScriptedExecutor::new()
            .respond_count("a/", 0)
            .fail("b/", "malformed glob")
            .respond_count("c/", 0);
        let outcome = DatasetResolver::new(&r).resolve(&mut exec, "x");

        match outcome {
            ResolveOutcome::NotFound { misses, .. } => {
                assert_eq!(misses.len(), 3);
                assert_eq!(misses[0].miss, ProbeMiss::Empty);
                assert_eq!(misses[1].miss, ProbeMiss::Error("malformed glob".into()));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert_eq!(exec.call_count(), 3);
    }

    #[test]
    fn rowless_count_is_an_empty_miss() {
        let r = registry("x", &["a/*.parquet"]);
        let mut exec = ScriptedExecutor::new().respond(
            "a/",
            crate::value::TabularResult::empty(vec!["len".into()]),
        );
        match DatasetResolver::new(&r).resolve(&mut exec, "x") {
            ResolveOutcome::NotFound { misses, .. } => {
                assert_eq!(misses[0].miss, ProbeMiss::Empty);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn non_integer_count_is_a_miss() {
        let r = registry("x", &["a/*.parquet"]);
        let mut exec = ScriptedExecutor::new().respond(
            "a/",
            crate::value::TabularResult::scalar("n", "lots".into()),
        );
        let outcome = DatasetResolver::new(&r).resolve(&mut exec, "x");
        assert!(!outcome.is_bound());
    }

    #[test]
    fn bound_dataset_is_not_reprobed() {
        let r = registry("x", &["a/*.parquet"]);
        let mut exec = ScriptedExecutor::new().respond_count("a/", 9);
        let mut resolver = DatasetResolver::new(&r);

        let first = resolver.resolve(&mut exec, "x");
        let second = resolver.resolve(&mut exec, "x");
        assert_eq!(first, second);
        assert_eq!(exec.call_count(), 1);
        assert_eq!(exec.registered(), [("x".to_string(), "a/*.parquet".to_string())]);
    }

    #[test]
    fn resolve_all_continues_past_missing_datasets() {
        let mut r = registry("missing", &["nowhere/*.parquet"]);
        r.upsert(LogicalDataset::new("present", ["here/*.parquet"]));
        let mut exec = ScriptedExecutor::new()
            .fail("nowhere/", "not found")
            .respond_count("here/", 12);
        let mut resolver = DatasetResolver::new(&r);

        let outcomes = resolver.resolve_all(&mut exec);
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].is_bound());
        assert!(outcomes[1].is_bound());
        assert_eq!(resolver.bindings().len(), 1);
        assert!(resolver.bindings().contains("present"));
    }

    #[test]
    fn binding_set_keeps_first_binding() {
        let mut set = BindingSet::new();
        set.insert(ResolvedBinding {
            dataset: "x".into(),
            pattern: "a".into(),
            row_count: 1,
        });
        let kept = set
            .insert(ResolvedBinding {
                dataset: "x".into(),
                pattern: "b".into(),
                row_count: 2,
            })
            .clone();
        assert_eq!(kept.pattern, "a");
        assert_eq!(set.len(), 1);
    }
}
