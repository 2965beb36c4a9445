/// Configuration system for sys-monitor.
///
/// Provides a layered configuration hierarchy:
///
/// 1. **Built-in defaults**: hardcoded in [`schema::MonitorConfig::default()`]
/// 2. **User global config**: `~/.sys-monitor/config.toml`
/// 3. **Project local config**: `.sys-monitor.toml` in the current working directory
/// 4. **Environment variables**: `SYS_MONITOR_*` and a few conventional
///    names (highest precedence)
///
/// Later layers replace earlier ones. Missing sections in a TOML file fall
/// back to built-in defaults.
///
/// # Usage
///
/// ```rust,ignore
/// use sys_monitor::config;
///
/// let cfg = config::load()?;
/// let tz = cfg.timezone()?;
/// ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::{MonitorConfig, PanelConfig};

/// Environment variables consulted for the store connection string, in
/// order of preference.
pub const STORE_URL_VARS: [&str; 3] = ["SYS_MONITOR_STORE_URL", "PSYCOPG_URI", "DATABASE_URL"];

/// Environment variables consulted for the listen port, in order of
/// preference.
pub const PORT_VARS: [&str; 2] = ["SYS_MONITOR_PORT", "PORT"];

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars. A missing file is skipped; a malformed one is an error.
pub fn load() -> Result<MonitorConfig> {
    let mut config = MonitorConfig::default();

    if let Some(global) = load_toml_file(global_config_path().as_deref())? {
        config = global;
    }

    if let Some(project) = load_toml_file(project_config_path().as_deref())? {
        config = project;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Load a TOML config file from the given path (if it exists).
fn load_toml_file(path: Option<&Path>) -> Result<Option<MonitorConfig>> {
    let Some(path) = path else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }

    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;

    tracing::debug!(message = "loaded config file", path = %path.display());
    Ok(Some(config))
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Path to the user global config: `~/.sys-monitor/config.toml`.
fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sys-monitor").join("config.toml"))
}

/// Path to the project local config: `.sys-monitor.toml` in the current directory.
fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".sys-monitor.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// `lookup` returns the value of a variable, if set. Supported variables:
/// - `SYS_MONITOR_STORE_URL`, then `PSYCOPG_URI`, then `DATABASE_URL`: store connection string
/// - `SYS_MONITOR_PORT`, then `PORT`: HTTP listen port
/// - `SYS_MONITOR_HOST`: HTTP listen host
/// - `SYS_MONITOR_WORKERS`: worker thread count
/// - `SYS_MONITOR_TIMEZONE`: display zone
/// - `SYS_MONITOR_INTERVAL_MINS`: resample interval
/// - `SYS_MONITOR_LOOKBACK_HOURS`: chart history
/// - `SYS_MONITOR_LATEST_LOOKBACK_MINS`: `/latest.json` window
pub fn apply_env_overrides<F>(config: &mut MonitorConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(url) = STORE_URL_VARS.iter().find_map(|key| non_empty(*key)) {
        config.store.url = Some(url);
    }
    if let Some(port) = PORT_VARS
        .iter()
        .find_map(|key| non_empty(*key).and_then(|v| v.trim().parse::<u16>().ok()))
    {
        config.server.port = port;
    }
    if let Some(host) = non_empty("SYS_MONITOR_HOST") {
        config.server.host = host;
    }
    if let Some(workers) = parse_positive(non_empty("SYS_MONITOR_WORKERS")) {
        config.server.workers = workers as usize;
    }
    if let Some(tz) = non_empty("SYS_MONITOR_TIMEZONE") {
        config.display.timezone = tz;
    }
    if let Some(mins) = parse_positive(non_empty("SYS_MONITOR_INTERVAL_MINS")) {
        config.resample.interval_mins = mins;
    }
    if let Some(hours) = parse_positive(non_empty("SYS_MONITOR_LOOKBACK_HOURS")) {
        config.resample.lookback_hours = hours;
    }
    if let Some(mins) = parse_positive(non_empty("SYS_MONITOR_LATEST_LOOKBACK_MINS")) {
        config.latest.lookback_mins = mins;
    }
}

/// Parse a strictly positive integer, ignoring anything else.
fn parse_positive(val: Option<String>) -> Option<u32> {
    val?.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

// ---------------------------------------------------------------------------
// Config init / set
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.sys-monitor/config.toml`.
///
/// Creates the `~/.sys-monitor/` directory if it doesn't exist. Returns an
/// error if the file already exists (use `force = true` to overwrite).
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.sys-monitor/ directory")?;
    }

    fs::write(&path, MonitorConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single config key to a value in the global config file.
///
/// Reads the current global config (or the annotated defaults), updates the
/// dotted key (e.g. `resample.interval_mins`) and writes the result back.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        MonitorConfig::default_toml()
    };

    let mut root: toml::Value = toml::from_str(&content).context("failed to parse config as TOML")?;
    set_toml_value(&mut root, key, value)?;

    // Reject edits that would leave the file unloadable.
    let updated = toml::to_string_pretty(&root).context("failed to serialize config")?;
    toml::from_str::<MonitorConfig>(&updated)
        .with_context(|| format!("invalid value for '{key}': {value}"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        anyhow::bail!("empty config key segment in '{key}'");
    }

    let mut current = root;
    for &part in &parts[..parts.len() - 1] {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let leaf = parts[parts.len() - 1];
    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(leaf) {
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        Some(toml::Value::Array(_)) => toml::Value::Array(
            raw_value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| toml::Value::String(s.to_string()))
                .collect(),
        ),
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert(leaf.to_string(), new_value);
    Ok(())
}

/// Show the effective (fully resolved) config as TOML, store URL redacted.
pub fn show_effective_config() -> Result<String> {
    let config = load()?;
    toml::to_string_pretty(&config.redacted()).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
