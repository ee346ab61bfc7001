//! Catalog-Herald main entry point
//!
//! This is the command-line interface for the crawler and announcer roles.

use anyhow::Context;
use catalog_herald::config::{load_config_with_hash, ChannelConfig, Config};
use catalog_herald::crawler::{run_crawler, Coordinator, CycleOutcome, Scheduler};
use catalog_herald::delivery::{
    build_channel, run_announcer, DeliveryOutcome, Verifier, VerifierSettings,
};
use catalog_herald::output::{export_seen, import_seen, load_statistics, print_statistics};
use catalog_herald::storage::{open_storage, SqliteStorage};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Catalog-Herald: announces new catalog entries exactly when they appear
///
/// The crawler scans the catalog's listing pages for ids it has never
/// announced and hands them to the announcer, which posts each one and
/// marks it seen only after confirming the post is visible.
#[derive(Parser, Debug)]
#[command(name = "catalog-herald")]
#[command(version = "1.0.0")]
#[command(about = "An incremental catalog watcher", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(
        short,
        long,
        value_name = "CONFIG",
        default_value = "herald.toml",
        global = true
    )]
    config: PathBuf,

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
    /// Run crawl cycles until interrupted
    Crawl,

    /// Deliver pending entries until interrupted
    Announce,

    /// Run a single crawl cycle and exit
    RunOnce {
        /// Scan this many listing pages instead of the scheduled tier
        #[arg(long, value_name = "PAGES")]
        pages: Option<u32>,
    },

    /// Run a single delivery pass and exit
    DeliverOnce,

    /// Show seen set size, pending batch, tier coverage and recent cycles
    Status {
        /// Number of recent cycles to show
        #[arg(long, default_value_t = 10)]
        cycles: usize,
    },

    /// Add ids from a newline-delimited file to the seen set
    ImportSeen {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Write the seen set to a newline-delimited file, numerically sorted
    ExportSeen {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Validate the configuration and print it
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::debug!("Configuration loaded (hash: {})", config_hash);

    match cli.command {
        Command::Crawl => run_crawler(config, config_hash)
            .await
            .context("Crawler stopped")?,
        Command::Announce => handle_announce(&config).await?,
        Command::RunOnce { pages } => handle_run_once(config, config_hash, pages).await?,
        Command::DeliverOnce => handle_deliver_once(&config).await?,
        Command::Status { cycles } => handle_status(&config, cycles)?,
        Command::ImportSeen { file } => {
            let mut storage = open_database(&config)?;
            let added = import_seen(&mut storage, &file)
                .with_context(|| format!("Failed to import {}", file.display()))?;
            println!("✓ Added {} new ids to the seen set", added);
        }
        Command::ExportSeen { file } => {
            let storage = open_database(&config)?;
            let written = export_seen(&storage, &file)
                .with_context(|| format!("Failed to export to {}", file.display()))?;
            println!("✓ Wrote {} ids to {}", written, file.display());
        }
        Command::CheckConfig => print_config(&config, &config_hash),
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_herald=info,warn"),
            1 => EnvFilter::new("catalog_herald=debug,info"),
            2 => EnvFilter::new("catalog_herald=trace,debug"),
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

fn open_database(config: &Config) -> anyhow::Result<SqliteStorage> {
    let path = Path::new(&config.storage.database_path);
    open_storage(path).with_context(|| format!("Failed to open database {}", path.display()))
}

async fn handle_announce(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let channel = build_channel(&config.channel, &config.user_agent)?;

    run_announcer(
        config,
        &mut storage,
        channel,
        catalog_herald::shutdown_on_ctrl_c(),
    )
    .await
        .context("Announcer stopped")
}

async fn handle_run_once(
    config: Config,
    config_hash: String,
    pages: Option<u32>,
) -> anyhow::Result<()> {
    let mut coordinator = Coordinator::from_config(config, config_hash)?;
    let report = coordinator
        .run_cycle_with_depth(pages)
        .await
        .context("Crawl cycle failed")?;

    match report.outcome {
        CycleOutcome::Published => println!(
            "✓ Cycle {}: {} pages scanned, {} entries handed off",
            report.cycle_id, report.scanned_pages, report.enqueued
        ),
        CycleOutcome::NothingNew => println!(
            "✓ Cycle {}: {} pages scanned, nothing new",
            report.cycle_id, report.scanned_pages
        ),
        CycleOutcome::QueueBusy => println!(
            "Cycle {} skipped: the previous batch is still pending",
            report.cycle_id
        ),
    }

    for id in &report.skipped_entries {
        println!("  ! entry {} skipped (details unavailable)", id);
    }

    Ok(())
}

async fn handle_deliver_once(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_database(config)?;
    let channel = build_channel(&config.channel, &config.user_agent)?;
    let verifier = Verifier::new(channel, VerifierSettings::from(&config.delivery));

    let report = verifier
        .deliver_pending(&mut storage)
        .await
        .context("Delivery pass failed")?;

    if report.drained() == 0 {
        println!("No pending entries");
        return Ok(());
    }

    for (id, outcome) in &report.outcomes {
        match outcome {
            DeliveryOutcome::Delivered(receipt) => {
                println!("  ✓ {} delivered ({})", id, receipt.reference)
            }
            DeliveryOutcome::AlreadyPresent(receipt) => {
                println!("  ✓ {} already posted ({})", id, receipt.reference)
            }
            DeliveryOutcome::AlreadySeen => println!("  - {} already seen", id),
            DeliveryOutcome::Unconfirmed => println!("  ? {} posted but not confirmed", id),
            DeliveryOutcome::PostFailed(message) => println!("  ✗ {} failed: {}", id, message),
        }
    }

    println!(
        "\n{} handled, {} committed, {} left for rediscovery",
        report.drained(),
        report.committed(),
        report.unresolved()
    );

    Ok(())
}

fn handle_status(config: &Config, cycles: usize) -> anyhow::Result<()> {
    println!("Database: {}\n", config.storage.database_path);

    let storage = open_database(config)?;
    let scheduler = Scheduler::new(config.tiers.clone());
    let stats = load_statistics(&storage, scheduler.tiers(), cycles, chrono::Utc::now())?;

    print_statistics(&stats);
    Ok(())
}

fn print_config(config: &Config, config_hash: &str) {
    println!("=== Catalog-Herald Configuration ===\n");

    println!("Crawler:");
    println!("  Fetch interval: {}ms", config.crawler.fetch_interval);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Cycle interval: {}s", config.crawler.cycle_interval);
    println!("  Max new per cycle: {}", config.crawler.max_new_per_cycle);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots_txt);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nCatalog:");
    println!("  Listing: {}", config.catalog.listing_url);
    println!("  Detail: {}", config.catalog.detail_url);
    println!("  Page size: {}", config.catalog.page_size);
    println!(
        "  Restricted genres: {}",
        config.catalog.restricted_genres.join(", ")
    );

    println!(
        "\nExtension: base {}, +1 every {} pages, max {}",
        config.extension.base, config.extension.growth_every, config.extension.max
    );

    println!("\nTiers ({}):", config.tiers.len());
    for tier in &config.tiers {
        println!("  - {} pages every {} min", tier.pages, tier.interval_minutes);
    }

    println!("\nDelivery:");
    match &config.channel {
        ChannelConfig::File { directory, .. } => {
            println!("  Channel: file outbox in {}", directory)
        }
        ChannelConfig::Webhook {
            main_url,
            restricted_url,
            ..
        } => println!("  Channel: webhook {} / {}", main_url, restricted_url),
    }
    println!(
        "  Confirm: {} attempts, {}ms apart",
        config.delivery.confirm_attempts, config.delivery.confirm_delay
    );
    println!("  Poll interval: {}s", config.delivery.poll_interval);

    println!("\nDatabase: {}", config.storage.database_path);

    println!("\n✓ Configuration is valid (hash: {})", config_hash);
}
