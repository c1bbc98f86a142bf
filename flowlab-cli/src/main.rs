//! FlowLab CLI: collect, batch-collect, pile, and cache commands.
//!
//! Commands:
//! - `collect`: feature table for one symbol over a date range, as CSV or JSON
//! - `collect-all`: every symbol in the universe, with success/failure counts
//! - `pile`: trailing individual-power pile for one symbol
//! - `cache status`: cached symbols with date range and row count

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowlab_core::calendar::{self, CalendarSystem};
use flowlab_core::data::store::write_csv;
use flowlab_core::data::{FeatureStore, FeedProvider, FileFeedProvider, SyntheticProvider, Universe};
use flowlab_runner::{FlowlabConfig, Pile, Pipeline, RangeCache};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Calendar days of synthetic history before the default start, so the
/// rolling mean is warm by the first requested row.
const SYNTHETIC_LEAD_DAYS: i64 = 60;

#[derive(Parser)]
#[command(
    name = "flowlab",
    about = "FlowLab CLI: investor-flow feature tables for TSE symbols"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Feature cache directory. Overrides the config.
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Directory of exported feeds: {feed_dir}/{symbol}/history.csv and client_types.csv.
    #[arg(long, global = true)]
    feed_dir: Option<PathBuf>,

    /// Calendar the exported feed files are dated in.
    #[arg(long, global = true, default_value = "jalali")]
    feed_calendar: CalendarSystem,

    /// Use deterministic synthetic feeds instead of exported files.
    #[arg(long, global = true, default_value_t = false)]
    synthetic: bool,

    /// Calendar of --start/--end. Overrides the config.
    #[arg(long, global = true)]
    calendar: Option<CalendarSystem>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feature table for one symbol.
    Collect {
        symbol: String,

        /// Start date (YYYY-MM-DD). Defaults to the configured default start.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to the latest known row.
        #[arg(long)]
        end: Option<String>,

        /// Write the refreshed table to the cache.
        #[arg(long, default_value_t = false)]
        persist: bool,

        /// Print JSON instead of CSV.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Collect every symbol in the universe.
    CollectAll {
        /// Write refreshed tables to the cache.
        #[arg(long, default_value_t = false)]
        persist: bool,

        /// Universe TOML. Defaults to the feed's own symbol list, else the built-in list.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// Collect symbols in parallel. Overrides the config.
        #[arg(long, default_value_t = false)]
        parallel: bool,
    },
    /// Trailing sum of individual power for one symbol.
    Pile {
        symbol: String,

        /// Window in rows. Defaults to the configured pile window.
        #[arg(long)]
        window: Option<usize>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached symbols with date range and row count.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = FlowlabConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(cal) = cli.calendar {
        config.calendar = cal;
    }

    match &cli.command {
        Commands::Collect {
            symbol,
            start,
            end,
            persist,
            json,
        } => run_collect(&cli, &config, symbol, start.as_deref(), end.as_deref(), *persist, *json),
        Commands::CollectAll {
            persist,
            universe,
            parallel,
        } => {
            config.parallel |= *parallel;
            run_collect_all(&cli, &config, universe.as_deref(), *persist)
        }
        Commands::Pile {
            symbol,
            window,
            start,
            end,
        } => run_pile(&cli, &config, symbol, *window, start.as_deref(), end.as_deref()),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config.cache_dir),
        },
    }
}

fn build_provider(cli: &Cli, config: &FlowlabConfig) -> Result<Box<dyn FeedProvider>> {
    match (&cli.feed_dir, cli.synthetic) {
        (Some(_), true) => bail!("--feed-dir and --synthetic are mutually exclusive"),
        (Some(dir), false) => {
            if !dir.is_dir() {
                bail!("feed directory does not exist: {}", dir.display());
            }
            Ok(Box::new(FileFeedProvider::new(dir, cli.feed_calendar)))
        }
        (None, true) => {
            let start = calendar::to_canonical(&config.default_start, config.calendar)?
                - chrono::Duration::days(SYNTHETIC_LEAD_DAYS);
            let end = chrono::Local::now().date_naive();
            Ok(Box::new(SyntheticProvider::new(start, end)))
        }
        (None, false) => bail!("one of --feed-dir or --synthetic is required"),
    }
}

fn build_pipeline(cli: &Cli, config: &FlowlabConfig) -> Result<Pipeline<Box<dyn FeedProvider>>> {
    let provider = build_provider(cli, config)?;
    info!(provider = provider.name(), cache_dir = %config.cache_dir.display(), "starting");
    let cache = RangeCache::new(provider, FeatureStore::new(&config.cache_dir))
        .with_refresh(config.refresh.strategy());
    Ok(Pipeline::new(cache, config.calendar, config.default_start.clone())
        .with_parallel(config.parallel))
}

fn run_collect(
    cli: &Cli,
    config: &FlowlabConfig,
    symbol: &str,
    start: Option<&str>,
    end: Option<&str>,
    persist: bool,
    json: bool,
) -> Result<()> {
    let pipeline = build_pipeline(cli, config)?;
    let start = start.unwrap_or(&config.default_start);
    let table = pipeline
        .run(symbol, start, end, persist)
        .with_context(|| format!("collect {symbol}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&table)?);
    } else {
        write_csv(&table, std::io::stdout().lock())?;
    }
    Ok(())
}

fn run_collect_all(
    cli: &Cli,
    config: &FlowlabConfig,
    universe: Option<&Path>,
    persist: bool,
) -> Result<()> {
    let pipeline = build_pipeline(cli, config)?;

    let symbols = match universe {
        Some(path) => Universe::from_file(path)?.all_symbols(),
        None => pipeline
            .cache()
            .provider()
            .symbols()
            .unwrap_or_else(|| Universe::default_tse().all_symbols()),
    };
    if symbols.is_empty() {
        bail!("universe is empty");
    }

    let report = pipeline.run_all(&symbols, persist);

    for (symbol, err) in report.errors() {
        eprintln!("Error for {symbol}: {err}");
    }
    println!(
        "Collected {} symbols: {} succeeded, {} failed",
        report.total, report.succeeded, report.failed
    );
    Ok(())
}

fn run_pile(
    cli: &Cli,
    config: &FlowlabConfig,
    symbol: &str,
    window: Option<usize>,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<()> {
    let pile = Pile::new(window.unwrap_or(config.pile_window))?;
    let pipeline = build_pipeline(cli, config)?;
    let start = start.unwrap_or(&config.default_start);
    let table = pipeline
        .run(symbol, start, end, false)
        .with_context(|| format!("collect {symbol}"))?;

    println!("date,pile");
    for point in pile.compute(&table) {
        let value = point.pile.map(|v| v.to_string()).unwrap_or_default();
        println!("{},{value}", point.date);
    }
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }

    let metas = FeatureStore::new(cache_dir).status()?;
    if metas.is_empty() {
        println!("Cache is empty: {}", cache_dir.display());
        return Ok(());
    }

    println!("Cache: {}", cache_dir.display());
    println!("Symbols: {}", metas.len());
    println!();
    println!("{:<12} {:<26} {:>8}  {:<19}", "Symbol", "Date Range", "Rows", "Cached At");
    println!("{}", "-".repeat(68));
    for meta in &metas {
        let range = match (meta.first_date, meta.last_date) {
            (Some(first), Some(last)) => format!("{first} to {last}"),
            _ => "(empty)".into(),
        };
        println!(
            "{:<12} {:<26} {:>8}  {}",
            meta.symbol,
            range,
            meta.row_count,
            meta.cached_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
