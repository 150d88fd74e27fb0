//! Plain-text and CSV rendering of query results, reports, and overviews.

use anyhow::{Context, Result};
use lakeprobe_core::{BindingSet, QueryOutcome, TabularResult};

use crate::overview::{DatasetOverview, DatasetStatus};
use crate::report::AnalyticsReport;

// ─── Tables ─────────────────────────────────────────────────────────

/// Fixed-width table with a header row and a rule under it.
pub fn render_table(result: &TabularResult) -> String {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|v| v.to_string()).collect())
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    push_row(&mut out, result.columns.iter().map(String::as_str), &widths);
    let rule_width = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    out.push_str(&"-".repeat(rule_width));
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(c, w)| format!("{c:<w$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

/// Comma-separated rendering with a header record.
pub fn export_csv(result: &TabularResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(&result.columns)?;
    for row in &result.rows {
        wtr.write_record(row.iter().map(|v| if v.is_null() { String::new() } else { v.to_string() }))?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One query outcome as the user sees it.
pub fn render_outcome(outcome: &QueryOutcome) -> String {
    match outcome {
        QueryOutcome::Rows(result) => render_table(result),
        QueryOutcome::Empty => "Query executed successfully (no results)\n".to_string(),
        QueryOutcome::Failed(e) => format!("Query failed: {e}\n"),
    }
}

// ─── Reports ────────────────────────────────────────────────────────

pub fn render_report(report: &AnalyticsReport) -> String {
    let mut out = format!("=== {} ===\n", report.group);
    for section in &report.sections {
        out.push_str(&format!("\n--- {} ---\n", section.label));
        match &section.outcome {
            QueryOutcome::Empty => out.push_str("(no rows)\n"),
            // Failures are reported once, below.
            QueryOutcome::Failed(_) => {}
            rows => out.push_str(&render_outcome(rows)),
        }
    }
    if let Some(failure) = &report.failure {
        out.push_str(&format!("\n[{}] FAILED: {failure}\n", report.group));
    }
    out
}

pub fn render_overview(overview: &[DatasetOverview]) -> String {
    let mut out = String::from("=== Datasets ===\n");
    for entry in overview {
        match &entry.status {
            DatasetStatus::Active { binding, columns, sample_error } => {
                out.push_str(&format!(
                    "\n{}: ACTIVE ({} rows)\n  pattern: {}\n",
                    entry.dataset, binding.row_count, binding.pattern
                ));
                if !columns.is_empty() {
                    out.push_str(&format!("  columns: {}\n", columns.join(", ")));
                }
                if let Some(err) = sample_error {
                    out.push_str(&format!("  sample failed: {err}\n"));
                }
            }
            DatasetStatus::NoData { misses } => {
                out.push_str(&format!(
                    "\n{}: NO DATA YET ({} patterns probed)\n",
                    entry.dataset,
                    misses.len()
                ));
                for probe in misses {
                    out.push_str(&format!("  {}: {}
", probe.pattern, probe.miss));
                }
            }
        }
    }
    out
}

/// `name -> pattern` lines for every binding.
pub fn render_bindings(bindings: &BindingSet) -> String {
    if bindings.is_empty() {
        return "No datasets resolved.\n".to_string();
    }
    let width = bindings.iter().map(|b| b.dataset.len()).max().unwrap_or(0);
    bindings
        .iter()
        .map(|b| format!("  {:<width$}  {}\n", b.dataset, b.pattern))
        .collect()
}
