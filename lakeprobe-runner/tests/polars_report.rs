//! End-to-end report run against Parquet files through the Polars executor.
//!
//! Files are laid out in a temporary directory the way the ingest sink lays
//! out the bucket, and the registry points at local globs instead of `s3://`.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use lakeprobe_core::{
    DatasetResolver, LogicalDataset, PatternRegistry, PolarsExecutor, QueryExecutor,
    TabularResult, MARKET_DATASET, NEWS_DATASET,
};
use lakeprobe_runner::{
    build_overview, crypto_report, render_report, AnalyticsReport, AnalyticsRunner,
    DatasetStatus, GroupFailure, ReportGroup, ScriptedLines, Session, Termination,
};
use polars::prelude::*;

fn write(path: &Path, df: &mut DataFrame) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let file = fs::File::create(path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();
}

fn write_market(root: &Path) {
    // 2024-03-10 .. 2024-03-13, one snapshot per day at midnight UTC.
    let base_ms = 1_710_028_800_000i64;
    let ts: Vec<i64> = (0..4).map(|d| base_ms + d * 86_400_000).collect();
    let mut df = DataFrame::new(vec![
        Column::new("timestamp".into(), ts)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap(),
        Column::new("price".into(), vec![68000.0, 69000.0, 71000.0, 72500.0]),
        Column::new("volume_24h".into(), vec![1.0e9, 1.1e9, 1.2e9, 1.3e9]),
        Column::new("market_cap".into(), vec![1.3e12, 1.35e12, 1.4e12, 1.42e12]),
        Column::new("price_change_24h".into(), vec![0.5, 1.4, 2.9, 2.1]),
        Column::new(
            "market_sentiment".into(),
            vec!["neutral", "bullish", "bullish", "bullish"],
        ),
    ])
    .unwrap();
    write(&root.join("bitcoin_market_data/data/part-0.parquet"), &mut df);
}

fn write_news(root: &Path) {
    // 2024-03-11: three articles, 2024-03-12: two, 2024-03-13: one.
    let base_ms = 1_710_028_800_000i64;
    let (day, hour) = (86_400_000i64, 3_600_000i64);
    let published = vec![
        base_ms + day + 10 * hour,
        base_ms + day + 10 * hour,
        base_ms + day + 14 * hour,
        base_ms + 2 * day + 8 * hour,
        base_ms + 2 * day + 20 * hour,
        base_ms + 3 * day,
    ];
    let mut df = DataFrame::new(vec![
        Column::new("id".into(), vec!["a", "b", "c", "d", "e", "f"]),
        Column::new("published_at".into(), published)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap(),
        Column::new(
            "source".into(),
            vec!["coindesk", "coindesk", "decrypt", "theblock", "coindesk", "decrypt"],
        ),
        Column::new(
            "sentiment_category".into(),
            vec!["positive", "positive", "neutral", "negative", "positive", "neutral"],
        ),
        Column::new("sentiment_score".into(), vec![0.8, 0.6, 0.0, -0.5, 0.9, 0.1]),
    ])
    .unwrap();
    // Nested under a date partition so only the recursive layout matches.
    write(
        &root.join("crypto_news_data/date=2024-03-13/part-0.parquet"),
        &mut df,
    );
}

fn rows<'a>(report: &'a AnalyticsReport, label: &str) -> &'a TabularResult {
    report
        .section(label)
        .and_then(|s| s.outcome.rows())
        .unwrap_or_else(|| panic!("{label} has no rows:\n{}", render_report(report)))
}

fn registry(root: &Path) -> PatternRegistry {
    let mut r = PatternRegistry::new();
    for name in [MARKET_DATASET, NEWS_DATASET] {
        r.upsert(LogicalDataset::new(
            name,
            [
                format!("{}/{name}/data/*.parquet", root.display()),
                format!("{}/{name}/**/*.parquet", root.display()),
            ],
        ));
    }
    r.upsert(LogicalDataset::new(
        "orders",
        [format!("{}/orders/**/*.parquet", root.display())],
    ));
    r
}

#[test]
fn overview_then_report_over_local_files() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    write_news(dir.path());
    let registry = registry(dir.path());

    let mut exec = PolarsExecutor::new();
    let mut resolver = DatasetResolver::new(&registry);
    let overview = build_overview(&mut resolver, &mut exec);

    assert_eq!(overview.len(), 3);
    match &overview[0].status {
        DatasetStatus::Active { binding, columns, .. } => {
            assert_eq!(binding.row_count, 4);
            assert!(binding.pattern.ends_with("bitcoin_market_data/data/*.parquet"));
            assert_eq!(columns.len(), 5);
            assert_eq!(columns[0], "timestamp");
        }
        other => panic!("market should be active, got {other:?}"),
    }
    match &overview[1].status {
        DatasetStatus::Active { binding, .. } => {
            assert_eq!(binding.row_count, 6);
            assert!(binding.pattern.ends_with("crypto_news_data/**/*.parquet"));
        }
        other => panic!("news should be active, got {other:?}"),
    }
    assert!(!overview[2].is_active());

    let bindings = resolver.into_bindings();
    // Last article is 2024-03-13 00:00, so the trailing 24h window is empty.
    let now = NaiveDate::from_ymd_opt(2024, 3, 14)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();

    let mut groups = crypto_report(now);
    groups.push(
        ReportGroup::new("Broken")
            .reads(MARKET_DATASET)
            .query("missing column", "SELECT nonexistent_column FROM {bitcoin_market_data}"),
    );
    groups.push(
        ReportGroup::new("Orders")
            .reads("orders")
            .query("count", "SELECT COUNT(*) FROM {orders}"),
    );

    let reports = AnalyticsRunner::new(&mut exec, &bindings).run_all(&groups);
    assert_eq!(reports.len(), 5);

    let market = &reports[0];
    assert!(!market.is_failed(), "{}", render_report(market));
    let snapshot = rows(market, "latest snapshot");
    assert_eq!(snapshot.row_count(), 1);
    assert_eq!(snapshot.value(0, "price").and_then(|v| v.as_f64()), Some(72500.0));
    let trend = rows(market, "7-day price trend");
    assert_eq!(trend.row_count(), 4);
    assert_eq!(trend.value(0, "avg_price").and_then(|v| v.as_f64()), Some(72500.0));
    assert_eq!(trend.value(0, "data_points").and_then(|v| v.as_i64()), Some(1));

    let news = &reports[1];
    assert!(!news.is_failed(), "{}", render_report(news));
    let last_day = rows(news, "articles in last 24h");
    assert_eq!(last_day.value(0, "articles").and_then(|v| v.as_i64()), Some(0));
    let breakdown = rows(news, "7-day sentiment breakdown");
    assert_eq!(breakdown.row_count(), 3);
    assert_eq!(
        breakdown.value(0, "sentiment_category").and_then(|v| v.as_str()),
        Some("positive")
    );
    assert_eq!(breakdown.value(0, "articles").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(
        breakdown.value(2, "sentiment_category").and_then(|v| v.as_str()),
        Some("negative")
    );
    let sources = rows(news, "top sources");
    assert_eq!(sources.row_count(), 3);
    assert_eq!(sources.value(0, "source").and_then(|v| v.as_str()), Some("coindesk"));

    let joined = &reports[2];
    assert!(!joined.is_failed(), "{}", render_report(joined));
    let daily = rows(joined, "30-day daily correlation");
    assert_eq!(daily.value(0, "days_with_data").and_then(|v| v.as_i64()), Some(3));
    assert_eq!(daily.value(0, "avg_daily_news").and_then(|v| v.as_f64()), Some(2.0));

    assert!(matches!(reports[3].failure, Some(GroupFailure::Query { .. })));
    assert!(matches!(
        &reports[4].failure,
        Some(GroupFailure::Unresolved { dataset }) if dataset == "orders"
    ));
}

#[test]
fn every_help_example_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_market(dir.path());
    write_news(dir.path());
    let registry = registry(dir.path());

    let mut exec = PolarsExecutor::new();
    let mut resolver = DatasetResolver::new(&registry);
    resolver.resolve_all(&mut exec);
    let bindings = resolver.into_bindings();

    let help = Session::new(&mut exec, &bindings).help();
    let examples: Vec<&str> = help
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("SELECT"))
        .collect();
    assert!(examples.iter().any(|sql| sql.contains("EXTRACT(HOUR")));

    for sql in examples {
        let result = exec.execute(sql);
        assert!(result.is_ok(), "{sql}: {result:?}");
    }
}

#[test]
fn session_queries_bound_tables_by_name() {
    let dir = tempfile::tempdir().unwrap();
    write_news(dir.path());
    let registry = registry(dir.path());

    let mut exec = PolarsExecutor::new();
    let mut resolver = DatasetResolver::new(&registry);
    resolver.resolve(&mut exec, NEWS_DATASET);
    let bindings = resolver.into_bindings();

    let mut source = ScriptedLines::new([
        "SELECT source, COUNT(*) AS n FROM crypto_news_data GROUP BY source ORDER BY n DESC;",
        "SELECT missing FROM crypto_news_data",
        "",
        "exit",
    ]);
    let mut out: Vec<u8> = Vec::new();
    let summary = Session::new(&mut exec, &bindings)
        .run(&mut source, &mut out)
        .unwrap();

    assert_eq!(summary.executed, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.termination, Termination::Command);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("coindesk"));
    assert!(text.contains("Query failed"));
}
