//! cider-analytics - trend and statistics reports for a cider journal
//!
//! Reads journal records as a JSON array and prints:
//! - Trend sets (collection growth, rating, spending, ABV)
//! - Descriptive statistics for one numeric field
//! - The resolved analytics configuration

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, error, info};

use cider_common::{Error, Granularity, TimeRange};
use cider_config::{default_cache_dir, resolve_config, AnalyticsConfig, ConfigPaths};
use cider_core::cache::{FileStore, MemoryStore, PersistentStore};
use cider_core::exit_codes::ExitCode;
use cider_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use cider_core::trend::{TrendQuery, TrendSet};
use cider_core::{AnalyticsEngine, CiderRecord, DateField, NumericField};

/// Poll interval while waiting on a background task.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Cider journal analytics
#[derive(Parser)]
#[command(name = "cider-analytics")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to analytics.json
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory of the persistent result cache
    #[arg(long, global = true, env = "CIDER_ANALYTICS_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Keep results in memory only
    #[arg(long, global = true)]
    no_persist: bool,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log output format on stderr
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute trend analyses for a set of records
    Trends(TrendsArgs),

    /// Descriptive statistics for one numeric field
    Summarize(SummarizeArgs),

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug)]
struct TrendsArgs {
    /// JSON array of records ("-" for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Time range: 1M, 3M, 6M, 1Y or ALL
    #[arg(long)]
    range: Option<TimeRange>,

    /// Grouping: day, week, month, quarter or year
    #[arg(long)]
    granularity: Option<Granularity>,

    /// Date field to bucket on
    #[arg(long, value_enum, default_value_t = DateField::CreatedAt)]
    date_field: DateField,

    /// Run through the background task queue
    #[arg(long)]
    background: bool,

    /// Task priority for --background (1-10)
    #[arg(long, default_value = "5")]
    priority: i64,
}

#[derive(Args, Debug)]
struct SummarizeArgs {
    /// JSON array of records ("-" for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Field to summarize
    #[arg(long, value_enum)]
    field: NumericField,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    source: String,
    path: Option<&'a Path>,
    config: &'a AnalyticsConfig,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cli_level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    init_logging(&LogConfig::from_env(cli_level, cli.global.log_format));
    let run_id = generate_run_id();
    debug!(run_id = %run_id, "cider-analytics starting");

    let exit_code = match cli.command {
        Commands::Trends(args) => run_trends(&cli.global, &args).await,
        Commands::Summarize(args) => run_summarize(&cli.global, &args).await,
        Commands::Config { command } => run_config(&cli.global, &command),
    };
    std::process::exit(exit_code.as_i32());
}

fn fail(err: &Error) -> ExitCode {
    error!(code = err.code(), category = %err.category(), "{}", err);
    ExitCode::from(err)
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::Clean
        }
        Err(e) => fail(&Error::Json(e)),
    }
}

fn load_config(global: &GlobalOpts) -> Result<(AnalyticsConfig, ConfigPaths), Error> {
    let paths = resolve_config(global.config.as_deref());
    debug!(source = %paths.source, path = ?paths.analytics, "configuration resolved");
    let config = AnalyticsConfig::load(paths.analytics.as_deref())?;
    Ok((config, paths))
}

async fn load_records(input: &Path) -> Result<Vec<CiderRecord>, Error> {
    let raw = if input == Path::new("-") {
        tokio::task::spawn_blocking(|| std::io::read_to_string(std::io::stdin()))
            .await
            .map_err(|e| Error::TaskFailed(e.to_string()))??
    } else {
        tokio::fs::read_to_string(input).await?
    };
    serde_json::from_str(&raw)
        .map_err(|e| Error::InvalidInput(format!("{}: {}", input.display(), e)))
}

async fn build_engine(global: &GlobalOpts, config: AnalyticsConfig) -> Result<AnalyticsEngine, Error> {
    let store: Arc<dyn PersistentStore> = if global.no_persist {
        Arc::new(MemoryStore::new())
    } else {
        let dir = global.cache_dir.clone().unwrap_or_else(default_cache_dir);
        debug!(dir = %dir.display(), "opening persistent cache");
        Arc::new(FileStore::open(dir).await?)
    };
    Ok(AnalyticsEngine::new(config, store))
}

async fn run_trends(global: &GlobalOpts, args: &TrendsArgs) -> ExitCode {
    match trends(global, args).await {
        Ok(set) => {
            let empty = set.collection_growth.is_none()
                && set.rating_trend.is_none()
                && set.spending_trend.is_none()
                && set.abv_trend.is_none();
            let code = print_json(&set);
            if empty && code == ExitCode::Clean {
                ExitCode::NoData
            } else {
                code
            }
        }
        Err(e) => fail(&e),
    }
}

async fn trends(global: &GlobalOpts, args: &TrendsArgs) -> Result<TrendSet, Error> {
    let (config, _) = load_config(global)?;
    let records = load_records(&args.input).await?;
    let engine = build_engine(global, config).await?;

    let defaults = engine.default_query();
    let query = TrendQuery {
        range: args.range.unwrap_or(defaults.range),
        granularity: args.granularity.unwrap_or(defaults.granularity),
        date_field: args.date_field,
    };
    info!(records = records.len(), range = %query.range, granularity = %query.granularity, "computing trends");

    if !args.background {
        return Ok(engine.compute_trends(&records, &query).await);
    }

    let task_id = engine.submit_trends(records, query, args.priority)?;
    let worker = engine.start_worker();
    let result = loop {
        if let Some(result) = engine.queue().get_result(&task_id) {
            break result;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    };
    engine.shutdown();
    let _ = worker.await;

    match (result.success, result.data, result.error) {
        (true, Some(data), _) => Ok(serde_json::from_value(data)?),
        (_, _, Some(report)) if report.code == 40 => Err(Error::Timeout {
            millis: result.duration_ms,
        }),
        (_, _, report) => Err(Error::TaskFailed(
            report.map(|r| r.message).unwrap_or_else(|| "no result data".to_string()),
        )),
    }
}

async fn run_summarize(global: &GlobalOpts, args: &SummarizeArgs) -> ExitCode {
    let outcome = async {
        let (config, _) = load_config(global)?;
        let records = load_records(&args.input).await?;
        let engine = AnalyticsEngine::new(config, Arc::new(MemoryStore::new()));
        let values: Vec<f64> = records.iter().filter_map(|r| r.value(args.field)).collect();
        Ok::<_, Error>(engine.summarize(&values))
    }
    .await;
    match outcome {
        Ok(summary) => print_json(&summary),
        Err(e) => fail(&e),
    }
}

fn run_config(global: &GlobalOpts, command: &ConfigCommands) -> ExitCode {
    match load_config(global) {
        Ok((config, paths)) => match command {
            ConfigCommands::Show => print_json(&ConfigReport {
                source: paths.source.to_string(),
                path: paths.analytics.as_deref(),
                config: &config,
            }),
            ConfigCommands::Validate => {
                println!("configuration OK ({})", paths.source);
                ExitCode::Clean
            }
        },
        Err(e) => fail(&e),
    }
}
