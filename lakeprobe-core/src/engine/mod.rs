//! Query executor seam.
//!
//! The [`QueryExecutor`] trait abstracts over SQL engines (Polars SQL in the
//! binary, a scripted double in tests). Callers never inspect engine-specific
//! error kinds: every failure is a [`QueryError`] carrying a message.

pub mod polars_sql;
pub mod scripted;

pub use polars_sql::PolarsExecutor;
pub use scripted::ScriptedExecutor;

use crate::value::TabularResult;
use thiserror::Error;

/// A query that did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Tagged outcome of a single query, consumed directly by reporting code.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The query ran and returned at least one row.
    Rows(TabularResult),
    /// The query ran and returned zero rows.
    Empty,
    /// The engine rejected or failed the query.
    Failed(QueryError),
}

impl QueryOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, QueryOutcome::Failed(_))
    }

    pub fn rows(&self) -> Option<&TabularResult> {
        match self {
            QueryOutcome::Rows(r) => Some(r),
            _ => None,
        }
    }
}

impl From<Result<TabularResult, QueryError>> for QueryOutcome {
    fn from(result: Result<TabularResult, QueryError>) -> Self {
        match result {
            Ok(r) if r.is_empty() => QueryOutcome::Empty,
            Ok(r) => QueryOutcome::Rows(r),
            Err(e) => QueryOutcome::Failed(e),
        }
    }
}

/// A blocking SQL engine.
///
/// One query runs at a time; `execute` takes `&mut self` because engines
/// keep a mutable table registry.
pub trait QueryExecutor {
    /// Human-readable engine name.
    fn name(&self) -> &str;

    /// Run a SQL statement to completion.
    fn execute(&mut self, sql: &str) -> Result<TabularResult, QueryError>;

    /// Render a storage path pattern as a relation usable in a `FROM` clause.
    fn relation(&self, pattern: &str) -> String {
        format!("'{}'", pattern.replace('\'', "''"))
    }

    /// Make a resolved pattern queryable under a table name.
    ///
    /// Engines without a table registry accept and ignore the request.
    fn register(&mut self, _name: &str, _pattern: &str) -> Result<(), QueryError> {
        Ok(())
    }
}

/// Run a query and fold the result into a [`QueryOutcome`].
pub fn run_query(executor: &mut dyn QueryExecutor, sql: &str) -> QueryOutcome {
    executor.execute(sql).into()
}
