//! LakeProbe Runner: the stages that run on top of dataset discovery.
//!
//! This crate builds on `lakeprobe-core` to provide:
//! - Dataset overview (resolve every registered dataset, sample its columns)
//! - Report groups with per-group failure isolation
//! - The built-in crypto market and news report
//! - The interactive query session
//! - TOML application configuration
//! - Table and CSV rendering

pub mod config;
pub mod groups;
pub mod overview;
pub mod render;
pub mod report;
pub mod session;

pub use config::{AppConfig, ConfigError, StorageOverrides};
pub use groups::crypto_report;
pub use overview::{build_overview, DatasetOverview, DatasetStatus};
pub use render::{
    export_csv, render_bindings, render_outcome, render_overview, render_report, render_table,
};
pub use report::{
    AnalyticsReport, AnalyticsRunner, GroupFailure, QueryTemplate, ReportGroup, SectionReport,
};
pub use session::{
    parse_command, Command, Input, LineSource, ScriptedLines, Session, SessionState,
    SessionSummary, Termination,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<ReportGroup>();
        assert_sync::<ReportGroup>();
        assert_send::<AnalyticsReport>();
        assert_sync::<AnalyticsReport>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<AppConfig>();
        assert_sync::<AppConfig>();
    }

    #[test]
    fn overview_is_send_sync() {
        assert_send::<DatasetOverview>();
        assert_sync::<DatasetOverview>();
    }
}
