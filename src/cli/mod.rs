//! CLI command implementations.
//!
//! Provides subcommand handlers for:
//! - `sys-monitor serve`: run the HTTP dashboard
//! - `sys-monitor latest`: newest value per tracked fact, from the store or
//!   a running dashboard
//! - `sys-monitor query FACT...`: resampled (or raw) series for ad-hoc facts
//! - `sys-monitor config show|init|set|path`: configuration management

use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};

use crate::config::{self, MonitorConfig};
use crate::dashboard::Dashboard;
use crate::facts::{BucketedSeries, FactSample, LatestValue};
use crate::web;

const REMOTE_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Output format for report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// sys-monitor serve
// ---------------------------------------------------------------------------

/// Overrides from the `serve` command line. `None` keeps the configured value.
#[derive(Debug, Default)]
pub struct ServeArgs {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub workers: Option<usize>,
}

/// Start the dashboard and block until the process is killed.
pub fn run_serve(args: ServeArgs) -> Result<()> {
    let mut config = config::load()?;
    apply_serve_args(&mut config, args);

    let dashboard = Dashboard::from_config(&config)?;
    let addr = config.server.bind_addr();

    println!(
        "{} Serving {} panels on {}",
        "✓".green().bold(),
        dashboard.panel_count(),
        format!("http://{addr}/").bold()
    );

    web::serve(dashboard, &addr, config.server.workers)
}

fn apply_serve_args(config: &mut MonitorConfig, args: ServeArgs) {
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.host = bind;
    }
    if let Some(workers) = args.workers {
        config.server.workers = workers.max(1);
    }
}

// ---------------------------------------------------------------------------
// sys-monitor latest
// ---------------------------------------------------------------------------

/// One line of `latest` output, whether read locally or over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LatestRow {
    ts: DateTime<FixedOffset>,
    fact_value: f64,
}

impl From<LatestValue> for LatestRow {
    fn from(value: LatestValue) -> Self {
        Self {
            ts: value.ts.fixed_offset(),
            fact_value: value.fact_value,
        }
    }
}

/// Show the newest value of every tracked fact.
///
/// With `from`, asks a running dashboard's `/latest.json` instead of the
/// store.
pub fn run_latest(format: OutputFormat, from: Option<&str>) -> Result<()> {
    let rows = match from {
        Some(base) => fetch_remote_latest(base)?,
        None => {
            let config = config::load()?;
            let dashboard = Dashboard::from_config(&config)?;
            dashboard
                .latest(Utc::now())?
                .into_iter()
                .map(|(name, value)| (name, LatestRow::from(value)))
                .collect()
        }
    };

    match format {
        OutputFormat::Json => print_latest_json(&rows)?,
        OutputFormat::Csv => print_latest_csv(&rows),
        OutputFormat::Table => print_latest_table(&rows, Utc::now()),
    }

    Ok(())
}

fn fetch_remote_latest(base: &str) -> Result<BTreeMap<String, LatestRow>> {
    let url = latest_url(base);
    tracing::debug!(message = "fetching remote latest", url = %url);

    let response = ureq::get(&url)
        .timeout(REMOTE_TIMEOUT)
        .call()
        .with_context(|| format!("failed to reach {url}"))?;
    response
        .into_json()
        .with_context(|| format!("unexpected response from {url}"))
}

/// Resolve `--from` to the `/latest.json` endpoint; a bare host:port gets
/// an `http://` scheme.
fn latest_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    let base = if base.contains("://") {
        base.to_string()
    } else {
        format!("http://{base}")
    };
    if base.ends_with("/latest.json") {
        base
    } else {
        format!("{base}/latest.json")
    }
}

fn print_latest_table(rows: &BTreeMap<String, LatestRow>, now: DateTime<Utc>) {
    if rows.is_empty() {
        println!("{}", "No recent samples for any tracked fact.".yellow());
        return;
    }

    println!("{}", "Latest Facts".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {:<24} {:>12} {:>10}  Timestamp", "Fact", "Value", "Age");
    println!("  {}", "-".repeat(58));

    for (i, (name, row)) in rows.iter().enumerate() {
        let line = format!(
            "  {:<24} {:>12} {:>10}  {}",
            truncate(name, 24),
            format_value(row.fact_value),
            format_age(now - row.ts.with_timezone(&Utc)),
            row.ts.format("%Y-%m-%d %H:%M %:z"),
        );
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_latest_json(rows: &BTreeMap<String, LatestRow>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(rows)?);
    Ok(())
}

fn print_latest_csv(rows: &BTreeMap<String, LatestRow>) {
    println!("fact_name,ts,fact_value");
    for (name, row) in rows {
        println!("{},{},{}", name, row.ts.to_rfc3339(), row.fact_value);
    }
}

// ---------------------------------------------------------------------------
// sys-monitor query
// ---------------------------------------------------------------------------

/// Print series for ad-hoc facts over the last `hours` (default: the chart
/// lookback). `raw` skips resampling and prints minute averages.
pub fn run_query(facts: &[String], hours: Option<u32>, raw: bool, format: OutputFormat) -> Result<()> {
    let config = config::load()?;
    let dashboard = Dashboard::from_config(&config)?;
    let lookback = hours
        .map(|h| Duration::hours(i64::from(h)))
        .unwrap_or_else(|| dashboard.chart_lookback());
    let now = Utc::now();

    if raw {
        let samples = dashboard.samples(facts, now, lookback)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&samples)?),
            OutputFormat::Csv => print_samples_csv(&samples),
            OutputFormat::Table => print_samples_table(&samples),
        }
    } else {
        let series = dashboard.series(facts, now, lookback)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&series)?),
            OutputFormat::Csv => print_series_csv(&series),
            OutputFormat::Table => print_series_table(&series),
        }
    }

    Ok(())
}

fn print_series_table(series: &[BucketedSeries]) {
    if series.is_empty() {
        println!("{}", "No samples in range.".yellow());
        return;
    }

    for s in series {
        let present = s.present_values().count();
        println!(
            "{} {}",
            s.fact_name.bold().cyan(),
            format!("({present} of {} intervals)", s.points.len()).dimmed()
        );
        for point in &s.points {
            let value = match point.fact_value {
                Some(v) => format_value(v).normal(),
                None => "—".dimmed(),
            };
            println!("  {}  {:>12}", point.timestamp.format("%a %m-%d %H:%M"), value);
        }
        println!();
    }
}

fn print_series_csv(series: &[BucketedSeries]) {
    println!("fact_name,ts,fact_value");
    for s in series {
        for point in &s.points {
            let value = point.fact_value.map(|v| v.to_string()).unwrap_or_default();
            println!("{},{},{}", s.fact_name, point.timestamp.to_rfc3339(), value);
        }
    }
}

fn print_samples_table(samples: &[FactSample]) {
    if samples.is_empty() {
        println!("{}", "No samples in range.".yellow());
        return;
    }

    println!("  {:<24} {:<22} {:>12}", "Fact", "Minute", "Average");
    println!("  {}", "-".repeat(60));
    for sample in samples {
        println!(
            "  {:<24} {:<22} {:>12}",
            truncate(&sample.fact_name, 24),
            sample.timestamp.format("%Y-%m-%d %H:%M").to_string(),
            format_value(sample.fact_value),
        );
    }
}

fn print_samples_csv(samples: &[FactSample]) {
    println!("fact_name,ts,fact_value");
    for sample in samples {
        println!("{},{},{}", sample.fact_name, sample.timestamp.to_rfc3339(), sample.fact_value);
    }
}

// ---------------------------------------------------------------------------
// sys-monitor config show | init | set | path
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML, with the store
/// password masked.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective sys-monitor Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    let project_exists = config::project_config_file()
        .map(|p| p.exists())
        .unwrap_or(false);
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.sys-monitor/config.toml", global_exists);
    print_source(".sys-monitor.toml", project_exists);
    println!(
        "  {} {}",
        "·".dimmed(),
        format!(
            "{}, {} and SYS_MONITOR_* environment variables",
            config::STORE_URL_VARS.join("/"),
            config::PORT_VARS.join("/")
        )
        .dimmed()
    );

    Ok(())
}

fn print_source(label: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), label.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{label} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.sys-monitor/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("{} Config written to {}", "✓".green().bold(), path.display());
    println!("  {}", "Set store.url (or PSYCOPG_URI) before serving.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Print where config files are read from.
pub fn run_config_path() -> Result<()> {
    let global = config::global_config_file().context("could not determine home directory")?;
    println!("{}", global.display());
    if let Some(project) = config::project_config_file() {
        println!("{}", project.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Up to two decimals, without trailing zeros.
fn format_value(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Coarse human age such as `45s`, `12m` or `3h`.
fn format_age(age: Duration) -> String {
    let secs = age.num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m", s / 60),
        s => format!("{}h", s / 3600),
    }
}

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
