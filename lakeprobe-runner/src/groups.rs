//! Built-in report groups for the crypto market and news datasets.
//!
//! Time windows are computed here from a caller-supplied `now` and written
//! into the SQL as timestamp literals, so the same clock always produces the
//! same statements.

use crate::report::ReportGroup;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use lakeprobe_core::{MARKET_DATASET, NEWS_DATASET};

pub const MARKET_OVERVIEW: &str = "Market overview";
pub const NEWS_SENTIMENT: &str = "News sentiment";
pub const PRICE_VS_SENTIMENT: &str = "Price vs sentiment";

/// Render a timestamp as a SQL string literal.
fn ts_literal(t: NaiveDateTime) -> String {
    format!("'{}'", t.format("%Y-%m-%d %H:%M:%S"))
}

/// Midnight `days` days before the date of `now`.
fn days_back(now: NaiveDateTime, days: i64) -> NaiveDateTime {
    (now.date() - Duration::days(days)).and_time(NaiveTime::MIN)
}

/// Latest market snapshot plus a 7-day daily price trend.
pub fn market_overview(now: NaiveDateTime) -> ReportGroup {
    let week = ts_literal(days_back(now, 7));
    ReportGroup::new(MARKET_OVERVIEW)
        .reads(MARKET_DATASET)
        .query(
            "latest snapshot",
            format!(
                "SELECT \"timestamp\", price, volume_24h, market_cap, price_change_24h, market_sentiment \
                 FROM {{{MARKET_DATASET}}} \
                 ORDER BY \"timestamp\" DESC \
                 LIMIT 1"
            ),
        )
        .query(
            "7-day price trend",
            format!(
                "WITH recent AS (\
                 SELECT CAST(\"timestamp\" AS DATE) AS day, price \
                 FROM {{{MARKET_DATASET}}} \
                 WHERE \"timestamp\" >= {week}) \
                 SELECT day, AVG(price) AS avg_price, MIN(price) AS min_price, \
                 MAX(price) AS max_price, COUNT(*) AS data_points \
                 FROM recent \
                 GROUP BY day \
                 ORDER BY day DESC"
            ),
        )
}

/// Recent article volume, sentiment mix, and the busiest sources.
pub fn news_sentiment(now: NaiveDateTime) -> ReportGroup {
    let day = ts_literal(now - Duration::hours(24));
    let week = ts_literal(days_back(now, 7));
    ReportGroup::new(NEWS_SENTIMENT)
        .reads(NEWS_DATASET)
        .query(
            "articles in last 24h",
            format!(
                "SELECT COUNT(*) AS articles \
                 FROM {{{NEWS_DATASET}}} \
                 WHERE published_at >= {day}"
            ),
        )
        .query(
            "7-day sentiment breakdown",
            format!(
                "SELECT sentiment_category, COUNT(*) AS articles, \
                 AVG(sentiment_score) AS avg_sentiment \
                 FROM {{{NEWS_DATASET}}} \
                 WHERE published_at >= {week} \
                 GROUP BY sentiment_category \
                 ORDER BY articles DESC"
            ),
        )
        .query(
            "top sources",
            format!(
                "SELECT source, COUNT(*) AS articles \
                 FROM {{{NEWS_DATASET}}} \
                 WHERE published_at >= {week} \
                 GROUP BY source \
                 ORDER BY articles DESC \
                 LIMIT 5"
            ),
        )
}

/// Daily price joined with daily news over 30 days, averaged across the days
/// that had at least one article.
///
/// Both sides are reduced to one row per day before the join, so
/// `avg_daily_news` is articles per day. It does not scale with the number of
/// market snapshots taken that day.
pub fn price_vs_sentiment(now: NaiveDateTime) -> ReportGroup {
    let month = ts_literal(days_back(now, 30));
    ReportGroup::new(PRICE_VS_SENTIMENT)
        .reads(MARKET_DATASET)
        .reads(NEWS_DATASET)
        .query(
            "30-day daily correlation",
            format!(
                "WITH market AS (\
                 SELECT CAST(\"timestamp\" AS DATE) AS day, price \
                 FROM {{{MARKET_DATASET}}} \
                 WHERE \"timestamp\" >= {month}), \
                 news AS (\
                 SELECT CAST(published_at AS DATE) AS day, sentiment_score \
                 FROM {{{NEWS_DATASET}}} \
                 WHERE published_at >= {month}), \
                 daily_price AS (\
                 SELECT day, AVG(price) AS avg_price FROM market GROUP BY day), \
                 daily_news AS (\
                 SELECT day, COUNT(*) AS news_count, AVG(sentiment_score) AS avg_sentiment \
                 FROM news GROUP BY day) \
                 SELECT COUNT(*) AS days_with_data, \
                 AVG(daily_price.avg_price) AS avg_daily_price, \
                 AVG(daily_news.news_count) AS avg_daily_news, \
                 AVG(daily_news.avg_sentiment) AS avg_daily_sentiment \
                 FROM daily_price \
                 INNER JOIN daily_news ON daily_price.day = daily_news.day \
                 WHERE daily_news.news_count > 0"
            ),
        )
}

/// Every built-in group, in report order.
pub fn crypto_report(now: NaiveDateTime) -> Vec<ReportGroup> {
    vec![
        market_overview(now),
        news_sentiment(now),
        price_vs_sentiment(now),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    #[test]
    fn windows_are_rendered_from_now() {
        let news = news_sentiment(noon());
        assert!(news.queries[0].sql.contains("'2024-03-14 12:30:00'"));
        assert!(news.queries[1].sql.contains("'2024-03-08 00:00:00'"));

        let corr = price_vs_sentiment(noon());
        assert!(corr.queries[0].sql.contains("'2024-02-14 00:00:00'"));
    }

    #[test]
    fn same_clock_same_statements() {
        assert_eq!(crypto_report(noon()), crypto_report(noon()));
    }

    #[test]
    fn templates_use_declared_placeholders() {
        for group in crypto_report(noon()) {
            for q in &group.queries {
                let mentioned: Vec<&String> = group
                    .datasets
                    .iter()
                    .filter(|d| q.sql.contains(&format!("{{{d}}}")))
                    .collect();
                assert!(!mentioned.is_empty(), "{} / {}", group.name, q.label);
            }
        }
        assert_eq!(price_vs_sentiment(noon()).datasets.len(), 2);
    }

    #[test]
    fn news_is_counted_per_day_before_the_join() {
        let sql = &price_vs_sentiment(noon()).queries[0].sql;
        let grouped = sql.find("FROM news GROUP BY day").unwrap();
        let joined = sql.find("INNER JOIN daily_news").unwrap();
        assert!(grouped < joined);
        assert!(sql.contains("AVG(daily_news.news_count) AS avg_daily_news"));
    }

    #[test]
    fn top_sources_limited_to_five() {
        let group = news_sentiment(noon());
        let top = group.queries.iter().find(|q| q.label == "top sources").unwrap();
        assert!(top.sql.ends_with("LIMIT 5"));
    }
}
