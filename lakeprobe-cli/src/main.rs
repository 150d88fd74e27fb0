//! LakeProbe CLI: find datasets in object storage and query them.
//!
//! Modes (mutually exclusive):
//! - `--query <SQL>`: run one statement and print the result
//! - `--overview`: resolve every dataset and show what was found
//! - `--report`: overview plus every report group (the default)
//! - `--interactive`: overview, then an interactive SQL prompt
//!
//! Only setup failures (config, storage, engine) exit non-zero; see
//! [`exit_codes`].

mod exit_codes;
mod terminal;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use lakeprobe_core::{
    run_query, DatasetResolver, PatternRegistry, PolarsExecutor, QueryExecutor, QueryOutcome,
    StorageError,
};
use lakeprobe_runner::{
    build_overview, crypto_report, export_csv, render_outcome, render_overview, render_report,
    AnalyticsRunner, AppConfig, ConfigError, LineSource, Session, StorageOverrides,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "lakeprobe",
    version,
    about = "LakeProbe: discover and query Parquet datasets in object storage"
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["query", "overview", "report", "interactive"])
        .multiple(false)
))]
struct Cli {
    /// Run a single SQL statement (no discovery).
    #[arg(short, long, value_name = "SQL")]
    query: Option<String>,

    /// Resolve datasets and print the overview only.
    #[arg(short, long)]
    overview: bool,

    /// Overview plus all report groups (default).
    #[arg(short, long)]
    report: bool,

    /// Overview, then an interactive SQL prompt.
    #[arg(short, long)]
    interactive: bool,

    /// Print the --query result as CSV.
    #[arg(long, requires = "query")]
    csv: bool,

    /// TOML configuration file.
    #[arg(short, long, env = "LAKEPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Storage endpoint (host:port or URL).
    #[arg(long, env = "LAKEPROBE_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "LAKEPROBE_ACCESS_KEY")]
    access_key: Option<String>,

    #[arg(long, env = "LAKEPROBE_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    #[arg(long, env = "LAKEPROBE_REGION")]
    region: Option<String>,

    /// Bucket used for the built-in dataset layouts.
    #[arg(long, env = "LAKEPROBE_BUCKET")]
    bucket: Option<String>,

    /// Do not probe the storage liveness endpoint before starting.
    #[arg(long, default_value_t = false)]
    skip_storage_check: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Query,
    Overview,
    Report,
    Interactive,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.query.is_some() {
            Mode::Query
        } else if self.overview {
            Mode::Overview
        } else if self.interactive {
            Mode::Interactive
        } else {
            Mode::Report
        }
    }

    fn storage_overrides(&self) -> StorageOverrides {
        StorageOverrides {
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            ..Default::default()
        }
    }
}

/// The query engine failed its startup check.
#[derive(Debug, Error)]
#[error("query engine failed to start: {0}")]
struct EngineInitError(String);

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(map_error_to_exit_code(&e));
    }
    std::process::exit(exit_codes::SUCCESS);
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn map_error_to_exit_code(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<ConfigError>().is_some() {
        exit_codes::CONFIG_ERROR
    } else if e.downcast_ref::<StorageError>().is_some() {
        exit_codes::STORAGE_ERROR
    } else if e.downcast_ref::<EngineInitError>().is_some() {
        exit_codes::ENGINE_ERROR
    } else {
        exit_codes::GENERAL_ERROR
    }
}

// ─── Setup ──────────────────────────────────────────────────────────

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };
    config.apply_overrides(cli.storage_overrides());
    Ok(config)
}

fn needs_storage(cli: &Cli, registry: &PatternRegistry) -> bool {
    match &cli.query {
        Some(sql) => sql.contains("s3://"),
        None => registry.uses_object_storage(),
    }
}

fn init_engine() -> Result<PolarsExecutor> {
    let mut exec = PolarsExecutor::new();
    exec.execute("SELECT 1 AS ok")
        .map_err(|e| EngineInitError(e.message))?;
    info!(engine = exec.name(), "query engine ready");
    Ok(exec)
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let registry = config.registry();

    // Must precede engine creation: the object-store client reads these.
    config.storage.export_env();

    if cli.skip_storage_check || !needs_storage(cli, &registry) {
        info!("storage check skipped");
    } else {
        config.storage.check_reachable(HEALTH_TIMEOUT)?;
        info!(endpoint = %config.storage.endpoint_url(), "storage reachable");
    }

    let mut exec = init_engine()?;

    // Opened before discovery so a terminal failure is a setup failure.
    let mut editor = match cli.mode() {
        Mode::Interactive => Some((
            terminal::install_interrupt_flag()?,
            terminal::EditorSource::new()?,
        )),
        _ => None,
    };
    let prompt = editor.as_mut().map(|(interrupt, source)| Prompt {
        source,
        interrupt: Arc::clone(interrupt),
    });

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match (cli.mode(), &cli.query) {
        (Mode::Query, Some(sql)) => run_single_query(&mut exec, sql, cli.csv, &mut out),
        (mode, _) => run_discovery(&mut exec, &registry, &config, mode, prompt, &mut out),
    }
}

/// Input side of an interactive session.
struct Prompt<'p> {
    source: &'p mut dyn LineSource,
    interrupt: Arc<AtomicBool>,
}

// ─── Modes ──────────────────────────────────────────────────────────

fn run_single_query(
    exec: &mut dyn QueryExecutor,
    sql: &str,
    csv: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let outcome = run_query(exec, sql);
    match (&outcome, csv) {
        (QueryOutcome::Rows(result), true) => out.write_all(export_csv(result)?.as_bytes())?,
        _ => out.write_all(render_outcome(&outcome).as_bytes())?,
    }
    if let QueryOutcome::Failed(e) = &outcome {
        warn!(error = %e, "query failed");
    }
    Ok(())
}

fn run_discovery(
    exec: &mut dyn QueryExecutor,
    registry: &PatternRegistry,
    config: &AppConfig,
    mode: Mode,
    prompt: Option<Prompt<'_>>,
    out: &mut dyn Write,
) -> Result<()> {
    if mode == Mode::Interactive && prompt.is_none() {
        anyhow::bail!("interactive mode needs a terminal");
    }

    let mut resolver = DatasetResolver::new(registry);
    let overview = build_overview(&mut resolver, exec);
    out.write_all(render_overview(&overview).as_bytes())?;
    let bindings = resolver.into_bindings();

    match mode {
        Mode::Overview | Mode::Query => Ok(()),
        Mode::Report => {
            let mut groups = crypto_report(chrono::Utc::now().naive_utc());
            groups.extend(config.report_groups.iter().cloned());

            let reports = AnalyticsRunner::new(exec, &bindings).run_all(&groups);
            for report in &reports {
                writeln!(out)?;
                out.write_all(render_report(report).as_bytes())?;
            }
            let failed = reports.iter().filter(|r| r.is_failed()).count();
            info!(groups = reports.len(), failed, "report complete");
            Ok(())
        }
        Mode::Interactive => {
            let Some(prompt) = prompt else {
                return Ok(());
            };
            writeln!(out)?;
            let summary = Session::new(exec, &bindings)
                .with_interrupt(prompt.interrupt)
                .run(prompt.source, out)
                .context("interactive session output failed")?;
            writeln!(
                out,
                "Session ended: {} queries, {} failed.",
                summary.executed, summary.failed
            )?;
            Ok(())
        }
    }
}
