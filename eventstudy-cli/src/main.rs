//! Event study CLI — download, returns, events and batch run commands.
//!
//! Commands:
//! - `download` — fetch prices and analyst recommendations from Yahoo Finance
//! - `returns` — build the daily returns table for one ticker
//! - `events` — build the upgrade/downgrade event table for one ticker
//! - `run` — run the pipeline for many tickers in parallel
//! - `init-config` — write a default study config

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use eventstudy_core::data::{MarketDataProvider, Retriever, YahooProvider};
use eventstudy_core::export::{self, events_csv, returns_csv};
use eventstudy_core::{run_batch, EventExtractor, ReturnBuilder, Stages, StudyConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "eventstudy",
    about = "Event study pipeline — daily returns and analyst rating events"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download prices and recommendations from Yahoo Finance.
    Download {
        /// Tickers to download (e.g., TSLA AAPL).
        #[arg(required = true)]
        tickers: Vec<String>,

        /// Path to a TOML study config. Defaults to the built-in study.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Start date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        end: Option<String>,

        /// Keep the price file even when recommendations cannot be fetched.
        #[arg(long, default_value_t = false)]
        allow_missing_recs: bool,
    },
    /// Build the returns table (date, ret, mkt) for one ticker.
    Returns {
        ticker: String,

        /// Path to a TOML study config. Defaults to the built-in study.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output CSV path. Prints to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build the event table (event_id, event_date, firm, event_type) for one ticker.
    Events {
        ticker: String,

        /// Path to a TOML study config. Defaults to the built-in study.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output CSV path. Prints to stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run returns and events for many tickers in parallel.
    Run {
        /// Tickers to process. Defaults to the config's ticker list.
        tickers: Vec<String>,

        /// Path to a TOML study config. Defaults to the built-in study.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Download fresh artifacts before building.
        #[arg(long, default_value_t = false)]
        download: bool,

        /// With --download, tolerate missing recommendations.
        #[arg(long, default_value_t = false)]
        allow_missing_recs: bool,
    },
    /// Write a default study config.
    InitConfig {
        path: PathBuf,

        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Download {
            tickers,
            config,
            start,
            end,
            allow_missing_recs,
        } => run_download(tickers, config, start, end, allow_missing_recs),
        Commands::Returns { ticker, config, out } => run_returns(&ticker, config, out),
        Commands::Events { ticker, config, out } => run_events(&ticker, config, out),
        Commands::Run {
            tickers,
            config,
            download,
            allow_missing_recs,
        } => run_pipeline(tickers, config, download, allow_missing_recs),
        Commands::InitConfig { path, force } => run_init_config(&path, force),
    }
}

/// Logs go to stderr so table output on stdout stays clean.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<StudyConfig> {
    match path {
        Some(path) => StudyConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(StudyConfig::default_study()),
    }
}

fn parse_date(raw: Option<&str>, fallback: NaiveDate) -> Result<NaiveDate> {
    match raw {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD")),
        None => Ok(fallback),
    }
}

fn run_download(
    tickers: Vec<String>,
    config_path: Option<PathBuf>,
    start: Option<String>,
    end: Option<String>,
    allow_missing_recs: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let start_date = parse_date(start.as_deref(), config.start)?;
    let end_date = parse_date(end.as_deref(), config.end)?;
    if start_date > end_date {
        bail!("start {start_date} is after end {end_date}");
    }

    tracing::info!(
        tickers = tickers.len(),
        start = %start_date,
        end = %end_date,
        "starting download"
    );
    let provider = YahooProvider::new()?;
    let retriever = Retriever::new(&provider, &config, start_date, end_date)
        .allow_missing_recommendations(allow_missing_recs);

    let mut failed = false;
    for ticker in &tickers {
        match retriever.retrieve(ticker) {
            Ok(report) => {
                let recs = report
                    .recommendation_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "none".into());
                println!(
                    "{ticker}: {} bars -> {}, {recs} recommendations",
                    report.bar_count,
                    report.prc_csv.display()
                );
            }
            Err(e) => {
                eprintln!("Error for {ticker}: {e}");
                failed = true;
            }
        }
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Write `bytes` to `out`, or to stdout when no path is given.
fn emit(bytes: &[u8], out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            export::write_atomic(path, bytes)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Saved to {} (blake3 {})",
                path.display(),
                export::fingerprint(bytes)
            );
        }
        None => std::io::stdout().lock().write_all(bytes)?,
    }
    Ok(())
}

fn run_returns(ticker: &str, config_path: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let table = ReturnBuilder::new(&config)
        .build_returns(ticker)
        .with_context(|| format!("building returns for {ticker}"))?;
    emit(&returns_csv(&table)?, out.as_deref())
}

fn run_events(ticker: &str, config_path: Option<PathBuf>, out: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let table = EventExtractor::new(&config)
        .build_events(ticker)
        .with_context(|| format!("building events for {ticker}"))?;
    emit(&events_csv(&table)?, out.as_deref())
}

fn run_pipeline(
    tickers: Vec<String>,
    config_path: Option<PathBuf>,
    download: bool,
    allow_missing_recs: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let tickers = if tickers.is_empty() {
        config.tickers.clone()
    } else {
        tickers
    };
    if tickers.is_empty() {
        bail!("no tickers given and the config lists none");
    }

    let stages = Stages {
        retrieve: download,
        ..Stages::default()
    };
    let yahoo = if download {
        Some(YahooProvider::new()?)
    } else {
        None
    };
    let provider = yahoo.as_ref().map(|p| p as &dyn MarketDataProvider);

    tracing::info!(tickers = tickers.len(), download, "starting batch run");
    let summary = run_batch(&config, provider, &tickers, stages, allow_missing_recs);

    println!(
        "{:<8} {:>8} {:>8} {:>10} {:>10}",
        "Ticker", "Returns", "Events", "Upgrades", "Downgrades"
    );
    println!("{}", "-".repeat(48));
    for run in &summary.succeeded {
        let returns = run.returns.as_ref().map_or(0, |r| r.rows);
        let (events, up, down) = run
            .events
            .as_ref()
            .map_or((0, 0, 0), |e| (e.rows, e.upgrades, e.downgrades));
        println!(
            "{:<8} {:>8} {:>8} {:>10} {:>10}",
            run.ticker, returns, events, up, down
        );
    }
    println!();
    println!(
        "{} of {} tickers succeeded. Outputs in {}",
        summary.succeeded.len(),
        summary.total,
        config.output_dir.display()
    );

    if !summary.all_succeeded() {
        for (ticker, err) in &summary.errors {
            eprintln!("Error for {ticker}: {err}");
        }
        std::process::exit(1);
    }
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    let toml = StudyConfig::default_study().to_toml()?;
    export::write_atomic(path, toml.as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}
