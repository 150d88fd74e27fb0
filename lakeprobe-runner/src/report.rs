//! Analytics runner: executes report groups against resolved bindings.
//!
//! A report group is a named, ordered list of query templates over one or more
//! datasets. Templates name datasets with `{dataset_name}` placeholders, which
//! are replaced by the executor's rendering of the bound pattern. Raw path
//! references in a template are passed through untouched.
//!
//! Failure isolation is per group:
//! - a group whose dataset is not bound fails before any engine call
//! - the first failing query ends its group; completed sections are kept
//! - a failed group never stops the groups after it
//!
//! Zero-row results are ordinary sections (`QueryOutcome::Empty`), not
//! failures.

use lakeprobe_core::{run_query, BindingSet, QueryError, QueryExecutor, QueryOutcome};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// One labelled query in a report group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplate {
    pub label: String,
    pub sql: String,
}

/// A named set of queries reported and failure-isolated together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportGroup {
    pub name: String,
    /// Datasets whose placeholders appear in the queries.
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub queries: Vec<QueryTemplate>,
}

impl ReportGroup {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            datasets: Vec::new(),
            queries: Vec::new(),
        }
    }

    /// Declare a dataset this group reads.
    pub fn reads(mut self, dataset: &str) -> Self {
        self.datasets.push(dataset.to_string());
        self
    }

    /// Append a query template.
    pub fn query(mut self, label: &str, sql: impl Into<String>) -> Self {
        self.queries.push(QueryTemplate {
            label: label.to_string(),
            sql: sql.into(),
        });
        self
    }

    /// Substitute every declared dataset placeholder in `sql`.
    pub fn render_sql(
        &self,
        sql: &str,
        bindings: &BindingSet,
        executor: &dyn QueryExecutor,
    ) -> Result<String, GroupFailure> {
        let mut rendered = sql.to_string();
        for dataset in &self.datasets {
            let binding = bindings
                .get(dataset)
                .ok_or_else(|| GroupFailure::Unresolved {
                    dataset: dataset.clone(),
                })?;
            rendered = rendered.replace(
                &format!("{{{dataset}}}"),
                &executor.relation(&binding.pattern),
            );
        }
        Ok(rendered)
    }
}

/// Why a group stopped early.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupFailure {
    /// A dataset the group reads has no binding.
    Unresolved { dataset: String },
    /// A query in the group failed in the engine.
    Query { label: String, error: QueryError },
}

impl fmt::Display for GroupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupFailure::Unresolved { dataset } => {
                write!(f, "dataset '{dataset}' was not found in storage")
            }
            GroupFailure::Query { label, error } => write!(f, "{label}: {error}"),
        }
    }
}

/// Result of one query in a group.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    pub label: String,
    pub sql: String,
    pub outcome: QueryOutcome,
}

/// Result of one report group.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    pub group: String,
    pub sections: Vec<SectionReport>,
    pub failure: Option<GroupFailure>,
}

impl AnalyticsReport {
    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    pub fn section(&self, label: &str) -> Option<&SectionReport> {
        self.sections.iter().find(|s| s.label == label)
    }
}

/// Runs report groups one at a time through a single executor.
pub struct AnalyticsRunner<'a> {
    executor: &'a mut dyn QueryExecutor,
    bindings: &'a BindingSet,
}

impl<'a> AnalyticsRunner<'a> {
    pub fn new(executor: &'a mut dyn QueryExecutor, bindings: &'a BindingSet) -> Self {
        Self { executor, bindings }
    }

    /// Run one group. Never fails: problems are recorded in the report.
    pub fn run_report(&mut self, group: &ReportGroup) -> AnalyticsReport {
        info!(group = group.name.as_str(), queries = group.queries.len(), "running report group");
        let mut report = AnalyticsReport {
            group: group.name.clone(),
            sections: Vec::with_capacity(group.queries.len()),
            failure: None,
        };

        for template in &group.queries {
            let sql = match group.render_sql(&template.sql, self.bindings, &*self.executor) {
                Ok(sql) => sql,
                Err(failure) => {
                    warn!(group = group.name.as_str(), %failure, "report group skipped");
                    report.failure = Some(failure);
                    return report;
                }
            };

            let outcome = run_query(self.executor, &sql);
            let failed = match &outcome {
                QueryOutcome::Failed(error) => Some(GroupFailure::Query {
                    label: template.label.clone(),
                    error: error.clone(),
                }),
                _ => None,
            };
            report.sections.push(SectionReport {
                label: template.label.clone(),
                sql,
                outcome,
            });

            if let Some(failure) = failed {
                warn!(group = group.name.as_str(), %failure, "report group failed");
                report.failure = Some(failure);
                return report;
            }
        }

        report
    }

    /// Run every group in order; each group is isolated from the others.
    pub fn run_all(&mut self, groups: &[ReportGroup]) -> Vec<AnalyticsReport> {
        groups.iter().map(|g| self.run_report(g)).collect()
    }
}
