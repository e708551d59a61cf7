//! Siteglean command-line entry point

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use siteglean::config::{load_config, Config};
use siteglean::crawler::{CrawlOptions, Crawler};
use siteglean::storage::{PageStore, SqliteStore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Siteglean: breadth-first site crawler
#[derive(Parser, Debug)]
#[command(name = "siteglean")]
#[command(version)]
#[command(about = "Breadth-first site crawler with adaptive politeness", long_about = None)]
struct Cli {
    /// Path to TOML configuration file; defaults apply when omitted
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a new crawl from a seed URL
    Crawl(CrawlArgs),

    /// Resume a paused crawl for a seed URL
    Resume(CrawlArgs),

    /// Show statistics from the database and exit
    Stats {
        /// Write statistics as JSON to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct CrawlArgs {
    /// Seed URL to crawl
    url: String,

    /// Maximum number of pages to crawl
    #[arg(long)]
    max_pages: Option<u64>,

    /// Maximum link depth from the seed
    #[arg(long)]
    max_depth: Option<u32>,

    /// Number of concurrent fetches
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long)]
    no_verify_ssl: bool,

    /// Route requests through the configured proxy pool
    #[arg(long)]
    use_proxies: bool,

    /// Write final statistics as JSON to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => load_config(path).context("failed to load configuration")?,
        None => Config::default(),
    };

    match cli.command {
        Command::Crawl(args) => handle_crawl(config, args, false).await,
        Command::Resume(args) => handle_crawl(config, args, true).await,
        Command::Stats { output } => handle_stats(config, output),
    }
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("siteglean=info,warn"),
            1 => EnvFilter::new("siteglean=debug,info"),
            2 => EnvFilter::new("siteglean=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs a crawl or resume and emits the final statistics
async fn handle_crawl(config: Config, args: CrawlArgs, resume: bool) -> anyhow::Result<()> {
    let mut options = CrawlOptions::from_config(&config);
    if args.max_pages.is_some() {
        options.max_pages = args.max_pages.filter(|n| *n > 0);
    }
    if args.max_depth.is_some() {
        options.max_depth = args.max_depth.filter(|n| *n > 0);
    }
    if let Some(concurrency) = args.concurrency {
        options.concurrency = concurrency.max(1);
    }
    if let Some(timeout) = args.timeout {
        options.timeout_secs = timeout;
    }
    if args.no_verify_ssl {
        options.verify_ssl = false;
    }
    if args.use_proxies {
        options.use_proxies = true;
    }

    let store = open_store(&config)?;
    let crawler = Crawler::new(&args.url, options, &config, store)
        .context("failed to build crawler")?;

    // Ctrl-C pauses the crawl; in-flight fetches finish and the session is
    // left resumable
    let pause_handle = crawler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, pausing crawl");
            pause_handle.pause();
        }
    });

    let result = if resume {
        crawler.resume().await
    } else {
        crawler.start().await
    };

    if let Err(e) = result {
        tracing::error!("Crawl failed: {}", e);
    }

    let stats = crawler.engine_stats();
    emit_json(&stats, args.output.as_deref())
}

/// Prints aggregate statistics from the database
fn handle_stats(config: Config, output: Option<PathBuf>) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let stats = {
        let mut store = store.lock().unwrap();
        store.init_schema().context("failed to initialize schema")?;
        store.get_stats(None).context("failed to query statistics")?
    };
    emit_json(&stats, output.as_deref())
}

fn open_store(config: &Config) -> anyhow::Result<Arc<Mutex<dyn PageStore>>> {
    let sqlite = SqliteStore::new(Path::new(&config.output.database_path))
        .context("failed to open database")?;
    Ok(Arc::new(Mutex::new(sqlite)))
}

fn emit_json<T: serde::Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
