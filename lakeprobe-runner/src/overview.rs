//! Dataset overview: resolve every registered dataset and peek at what it holds.

use lakeprobe_core::{
    run_query, DatasetResolver, Probe, QueryExecutor, QueryOutcome, ResolveOutcome,
    ResolvedBinding,
};
use tracing::warn;

/// Rows fetched for the sample.
const SAMPLE_ROWS: usize = 3;
/// Column names shown per dataset.
const SAMPLE_COLUMNS: usize = 5;

/// What the overview found for one dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum DatasetStatus {
    /// Bound to a pattern. `columns` is empty when the sample query failed.
    Active {
        binding: ResolvedBinding,
        columns: Vec<String>,
        sample_error: Option<String>,
    },
    /// No candidate held rows.
    NoData { misses: Vec<Probe> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatasetOverview {
    pub dataset: String,
    pub status: DatasetStatus,
}

impl DatasetOverview {
    pub fn is_active(&self) -> bool {
        matches!(self.status, DatasetStatus::Active { .. })
    }
}

/// Resolve every dataset in the resolver's registry, in registry order, and
/// sample the ones that bound. Bindings stay in the resolver for later stages.
pub fn build_overview(
    resolver: &mut DatasetResolver<'_>,
    executor: &mut dyn QueryExecutor,
) -> Vec<DatasetOverview> {
    let registry = resolver.registry();
    let names: Vec<String> = registry.names().into_iter().map(String::from).collect();

    names
        .into_iter()
        .map(|name| match resolver.resolve(executor, &name) {
            ResolveOutcome::Bound(binding) => sample(executor, binding),
            ResolveOutcome::NotFound { misses, .. } => DatasetOverview {
                dataset: name,
                status: DatasetStatus::NoData { misses },
            },
        })
        .collect()
}

fn sample(executor: &mut dyn QueryExecutor, binding: ResolvedBinding) -> DatasetOverview {
    let sql = format!(
        "SELECT * FROM {} LIMIT {SAMPLE_ROWS}",
        executor.relation(&binding.pattern)
    );
    let (columns, sample_error) = match run_query(executor, &sql) {
        QueryOutcome::Rows(result) => (
            result.columns.into_iter().take(SAMPLE_COLUMNS).collect(),
            None,
        ),
        QueryOutcome::Empty => (Vec::new(), None),
        QueryOutcome::Failed(e) => {
            warn!(dataset = binding.dataset.as_str(), error = %e, "sample query failed");
            (Vec::new(), Some(e.message))
        }
    };

    DatasetOverview {
        dataset: binding.dataset.clone(),
        status: DatasetStatus::Active {
            binding,
            columns,
            sample_error,
        },
    }
}
