//! Catalog-Crawler main entry point
//!
//! This is the command-line interface for the marketplace catalog crawler.

use anyhow::Context;
use catalog_crawler::api::{MarketplaceApi, RetryingHttpClient};
use catalog_crawler::config::{load_config_with_hash, load_letters, Config};
use catalog_crawler::crawler::{CrawlOrchestrator, EntityKind, ProgressObserver};
use catalog_crawler::decode::decode_subjects;
use catalog_crawler::output::{print_report, RunReport};
use catalog_crawler::sink::{build_sink, with_sink};
use catalog_crawler::storage::{open_storage, BrandStore};
use catalog_crawler::CrawlError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Log a progress line every this many published entities
const PROGRESS_EVERY: u64 = 1000;

const DEFAULT_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 1000;

/// Catalog-Crawler: a concurrent marketplace catalog ingester
///
/// Crawls brands, products and per-warehouse stock quantities from the
/// marketplace and publishes them to a message broker or to local files.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A concurrent marketplace catalog ingester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    /// Write records to local files instead of the broker
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover brands, then crawl all their products and quantities
    All,

    /// Discover and publish brands only
    Brands,

    /// Crawl products and quantities of a single brand
    Products {
        /// Marketplace brand id
        brand_id: u32,
    },

    /// Crawl products of every brand stored in the registry
    AllProducts {
        /// Brands per batch (1-1000)
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Publish products only
        #[arg(long)]
        skip_quantities: bool,
    },

    /// Print the category list
    Subjects,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match load_config_with_hash(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match (&cli.config, &config_hash) {
        (Some(path), Some(hash)) => {
            tracing::info!("Configuration loaded from {} (hash: {})", path.display(), hash)
        }
        _ => tracing::info!("Using default configuration with environment overrides"),
    }

    if cli.mock {
        config.sink.mock = true;
    }

    let report = match cli.command {
        Command::All => handle_all(&config).await?,
        Command::Brands => handle_brands(&config).await?,
        Command::Products { brand_id } => handle_products(&config, brand_id).await?,
        Command::AllProducts {
            batch_size,
            skip_quantities,
        } => handle_all_products(&config, batch_size, skip_quantities).await?,
        Command::Subjects => return handle_subjects(&config).await,
    };

    print_report(&report);
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Logs a line every `PROGRESS_EVERY` published entities
fn progress_logger() -> impl ProgressObserver {
    let published = AtomicU64::new(0);
    move |kind: EntityKind| {
        let count = published.fetch_add(1, Ordering::Relaxed) + 1;
        if count % PROGRESS_EVERY == 0 {
            tracing::info!("Published {} entities (latest: {})", count, kind);
        }
    }
}

/// Handles `all`: discovery, pagination and quantities
async fn handle_all(config: &Config) -> anyhow::Result<RunReport> {
    let letters = load_letters(&config.crawler.letters_path)?;
    let registry = open_storage(&config.storage.database_path)?;
    let sink = build_sink(&config.sink, &config.http)?;

    tracing::info!("Starting full crawl over {} letters", letters.len());

    let report = with_sink(sink, |sink| async move {
        let orchestrator = CrawlOrchestrator::from_config(config, sink)?
            .with_registry(registry)
            .with_observer(progress_logger());
        orchestrator.run_full(&letters).await
    })
    .await?;

    Ok(report)
}

/// Handles `brands`: discovery only
async fn handle_brands(config: &Config) -> anyhow::Result<RunReport> {
    let letters = load_letters(&config.crawler.letters_path)?;
    let registry = open_storage(&config.storage.database_path)?;
    let sink = build_sink(&config.sink, &config.http)?;
    let started = Instant::now();

    let discovery = with_sink(sink, |sink| async move {
        let orchestrator = CrawlOrchestrator::from_config(config, sink)?
            .with_registry(registry)
            .with_observer(progress_logger());
        orchestrator.discover_brands(&letters).await
    })
    .await?;

    let mut report = RunReport::new();
    report.record_discovery(&discovery);
    report.duration = started.elapsed();
    Ok(report)
}

/// Handles `products <BRAND_ID>`
async fn handle_products(config: &Config, brand_id: u32) -> anyhow::Result<RunReport> {
    let sink = build_sink(&config.sink, &config.http)?;

    tracing::info!("Crawling products of brand {}", brand_id);

    let report = with_sink(sink, |sink| async move {
        let orchestrator =
            CrawlOrchestrator::from_config(config, sink)?.with_observer(progress_logger());
        Ok::<_, CrawlError>(orchestrator.crawl_products(&[brand_id]).await)
    })
    .await?;

    Ok(report)
}

/// Handles `all-products`: crawls registry brands in keyset batches
async fn handle_all_products(
    config: &Config,
    batch_size: usize,
    skip_quantities: bool,
) -> anyhow::Result<RunReport> {
    let batch_size = if (1..=MAX_BATCH_SIZE).contains(&batch_size) {
        batch_size
    } else {
        tracing::warn!(
            "Batch size {} outside 1-{}, using {}",
            batch_size,
            MAX_BATCH_SIZE,
            DEFAULT_BATCH_SIZE
        );
        DEFAULT_BATCH_SIZE
    };

    let registry = open_storage(&config.storage.database_path).with_context(|| {
        format!(
            "Failed to open brand registry {}",
            config.storage.database_path.display()
        )
    })?;
    let total = registry.count_brands()?;
    if total == 0 {
        tracing::warn!("Brand registry is empty; run the `brands` command first");
    }

    let sink = build_sink(&config.sink, &config.http)?;

    let report = with_sink(sink, |sink| async move {
        let orchestrator =
            CrawlOrchestrator::from_config(config, sink)?.with_observer(progress_logger());
        let mut report = RunReport::new();
        let mut last_id = 0;
        let mut done = 0u64;

        loop {
            let brands = registry.brands_after(last_id, batch_size)?;
            let Some(last) = brands.last() else {
                break;
            };
            last_id = last.id;

            let ids: Vec<u32> = brands.iter().map(|brand| brand.id).collect();
            done += ids.len() as u64;
            tracing::info!("Crawling brands {}/{}", done, total);

            let batch = if skip_quantities {
                let started = Instant::now();
                let pagination = orchestrator.paginate_products(&ids).await;
                let mut batch = RunReport::new();
                batch.record_pagination(&pagination);
                batch.duration = started.elapsed();
                batch
            } else {
                orchestrator.crawl_products(&ids).await
            };
            report.merge(&batch);
        }

        Ok::<_, CrawlError>(report)
    })
    .await?;

    Ok(report)
}

/// Handles `subjects`: prints the category list
async fn handle_subjects(config: &Config) -> anyhow::Result<()> {
    let client = RetryingHttpClient::new(&config.http)?;
    let api = MarketplaceApi::new(Arc::new(client), &config.endpoints)?;

    let value = api.subjects().await?;
    let subjects = decode_subjects(&value);

    for subject in &subjects {
        let parent = subject
            .parent_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{}\t{}\t{}", subject.id, parent, subject.name);
    }

    println!("\n{} subjects", subjects.len());
    Ok(())
}
