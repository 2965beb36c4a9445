use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use sys_monitor::cli;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;

#[derive(Debug, Parser)]
#[command(name = "sys-monitor", version)]
#[command(about = "Charts and latest values for host facts stored in PostgreSQL")]
struct App {
    /// Logging verbosity: trace, debug, info, warn or error. `RUST_LOG` wins
    /// when set.
    #[arg(long, global = true, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the HTML dashboard and /latest.json
    Serve {
        /// Port to listen on (overrides SYS_MONITOR_PORT / PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Host address to bind
        #[arg(long)]
        bind: Option<String>,
        /// Number of HTTP worker threads
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Show the newest value of every tracked fact
    Latest {
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
        /// Read from a running dashboard (host:port or URL) instead of the store
        #[arg(long)]
        from: Option<String>,
    },
    /// Print resampled series for one or more facts
    Query {
        /// Fact names, e.g. cpu_temp_f
        #[arg(required = true)]
        facts: Vec<String>,
        /// How many hours back to look (default: the chart lookback)
        #[arg(long)]
        hours: Option<u32>,
        /// Print per-minute averages instead of resampled intervals
        #[arg(long)]
        raw: bool,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Inspect or edit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config file to ~/.sys-monitor/config.toml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a value in the global config file, e.g. `server.port 8080`
    Set { key: String, value: String },
    /// Print config file locations
    Path,
}

fn init_logging(level: Level) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let app = App::parse();
    init_logging(app.log_level);

    match app.command {
        Commands::Serve { port, bind, workers } => cli::run_serve(cli::ServeArgs { port, bind, workers }),
        Commands::Latest { format, from } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_latest(fmt, from.as_deref())
        }
        Commands::Query {
            facts,
            hours,
            raw,
            format,
        } => {
            let fmt = cli::OutputFormat::from_str_opt(Some(&format));
            cli::run_query(&facts, hours, raw, fmt)
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Path => cli::run_config_path(),
        },
    }
}
