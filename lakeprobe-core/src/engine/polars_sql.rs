//! Polars SQL executor.
//!
//! Statements run through a [`SQLContext`]. Storage patterns are rendered as
//! `read_parquet('<pattern>')` table functions, which accept local paths,
//! globs (including `**`), and `s3://` URLs. Object-store credentials are read
//! from the process environment (see [`crate::storage::StorageSettings::export_env`]).
//!
//! Resolved bindings are registered as lazy Parquet scans so interactive
//! queries can use the dataset name as a table.

use super::{QueryError, QueryExecutor};
use crate::value::{TabularResult, Value};
use chrono::NaiveDate;
use polars::prelude::*;
use polars::sql::SQLContext;
use tracing::debug;

/// Polars-backed [`QueryExecutor`].
pub struct PolarsExecutor {
    ctx: SQLContext,
}

impl PolarsExecutor {
    pub fn new() -> Self {
        Self {
            ctx: SQLContext::new(),
        }
    }

    /// Names of tables registered in this context.
    pub fn tables(&self) -> Vec<String> {
        self.ctx.get_tables()
    }
}

impl Default for PolarsExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExecutor for PolarsExecutor {
    fn name(&self) -> &str {
        "polars"
    }

    fn execute(&mut self, sql: &str) -> Result<TabularResult, QueryError> {
        debug!(sql, "executing");
        let lf = self.ctx.execute(sql).map_err(engine_error)?;
        let df = lf.collect().map_err(engine_error)?;
        if df.height() == 0 && is_ungrouped_count(sql, &df) {
            return Ok(zero_counts(&df));
        }
        dataframe_to_tabular(&df)
    }

    fn relation(&self, pattern: &str) -> String {
        format!("read_parquet('{}')", pattern.replace('\'', "''"))
    }

    fn register(&mut self, name: &str, pattern: &str) -> Result<(), QueryError> {
        let lf = LazyFrame::scan_parquet(pattern, ScanArgsParquet::default())
            .map_err(engine_error)?;
        self.ctx.register(name, lf);
        Ok(())
    }
}

fn engine_error(e: PolarsError) -> QueryError {
    QueryError::new(e.to_string())
}

/// An ungrouped aggregate whose every output column is a row count.
///
/// Polars collects these to zero rows when no input row matches, where SQL
/// expects a single row of zeros.
fn is_ungrouped_count(sql: &str, df: &DataFrame) -> bool {
    let upper = sql.to_ascii_uppercase();
    df.width() > 0
        && upper.contains("COUNT(")
        && !upper.contains("GROUP BY")
        && df.get_columns().iter().all(|c| c.dtype() == &IDX_DTYPE)
}

fn zero_counts(df: &DataFrame) -> TabularResult {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let row = vec![Value::UInt(0); columns.len()];
    TabularResult::new(columns, vec![row])
}

// ── DataFrame conversion ────────────────────────────────────────────

/// Convert a collected DataFrame into row-major [`TabularResult`].
fn dataframe_to_tabular(df: &DataFrame) -> Result<TabularResult, QueryError> {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let n = df.height();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let mut row = Vec::with_capacity(columns.len());
        for column in df.get_columns() {
            let cell = column
                .get(i)
                .map_err(|e| QueryError::new(format!("read row {i}: {e}")))?;
            row.push(any_value_to_value(&cell));
        }
        rows.push(row);
    }

    Ok(TabularResult::new(columns, rows))
}

/// Map a Polars cell onto a [`Value`]. Types without a direct mapping keep
/// their display text.
fn any_value_to_value(cell: &AnyValue) -> Value {
    match cell {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(*b),
        AnyValue::Int8(v) => Value::Int(*v as i64),
        AnyValue::Int16(v) => Value::Int(*v as i64),
        AnyValue::Int32(v) => Value::Int(*v as i64),
        AnyValue::Int64(v) => Value::Int(*v),
        AnyValue::UInt8(v) => Value::UInt(*v as u64),
        AnyValue::UInt16(v) => Value::UInt(*v as u64),
        AnyValue::UInt32(v) => Value::UInt(*v as u64),
        AnyValue::UInt64(v) => Value::UInt(*v),
        AnyValue::Float32(v) => Value::Float(*v as f64),
        AnyValue::Float64(v) => Value::Float(*v),
        AnyValue::String(s) => Value::Text(s.to_string()),
        AnyValue::StringOwned(s) => Value::Text(s.to_string()),
        AnyValue::Date(days) => match epoch_plus_days(*days) {
            Some(date) => Value::Date(date),
            None => Value::Text(cell.to_string()),
        },
        other => Value::Text(other.to_string()),
    }
}

fn epoch_plus_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)?.checked_add_signed(chrono::Duration::days(days as i64))
}
