//! Corpus Harvest main entry point
//!
//! This is the command-line interface for the resumable corpus harvester.

use anyhow::Context;
use clap::Parser;
use corpus_harvest::config::{load_config_with_hash, Config};
use corpus_harvest::crawler::harvest;
use corpus_harvest::extract::{extract_records, read_records, write_records, ExtractRules};
use corpus_harvest::output::{export_index, load_statistics, print_statistics};
use corpus_harvest::storage::{open_storage, ProgressStore};
use corpus_harvest::translate::{translate_records, translator_from_config};
use corpus_harvest::{Coordinate, HarvestStop, StopReason};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Corpus Harvest: a resumable harvester for paginated remote corpora
///
/// Walks a book volume by volume, section by section, page by page through
/// the configured API, storing each page and checkpointing after every step.
/// Interrupted runs resume from the checkpoint.
#[derive(Parser, Debug)]
#[command(name = "corpus-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A resumable harvester for paginated remote corpora", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Reset the checkpoint to V1 S1 P1 before running
    #[arg(long, conflicts_with = "start_at")]
    fresh: bool,

    /// Move the checkpoint to V,S,P before running
    #[arg(long, value_name = "V,S,P", conflicts_with = "fresh")]
    start_at: Option<Coordinate>,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with_all = ["status", "extract", "translate", "export_index"])]
    dry_run: bool,

    /// Show checkpoint, stored pages and gaps, then exit
    #[arg(long, conflicts_with_all = ["dry_run", "extract", "translate", "export_index"])]
    status: bool,

    /// Extract records from stored pages and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status", "translate", "export_index"])]
    extract: bool,

    /// Translate extracted records and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status", "extract", "export_index"])]
    translate: bool,

    /// Write a bulk index file from translated records and exit
    #[arg(long, conflicts_with_all = ["dry_run", "status", "extract", "translate"])]
    export_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Operator intervention on the checkpoint happens before any mode runs
    let reset = if cli.fresh {
        Some(Coordinate::START)
    } else {
        cli.start_at
    };
    if let Some(start) = reset {
        if !cli.dry_run {
            move_checkpoint(&config, start)?;
        }
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config, reset)?;
    } else if cli.status {
        handle_status(&config)?;
    } else if cli.extract {
        handle_extract(&config)?;
    } else if cli.translate {
        handle_translate(&config).await?;
    } else if cli.export_index {
        handle_export_index(&config)?;
    } else {
        return handle_harvest(&config, &config_hash).await;
    }

    Ok(ExitCode::SUCCESS)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("corpus_harvest=info,warn"),
            1 => EnvFilter::new("corpus_harvest=debug,info"),
            2 => EnvFilter::new("corpus_harvest=trace,debug"),
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

/// Overwrites the checkpoint (--fresh / --start-at)
fn move_checkpoint(config: &Config, start: Coordinate) -> anyhow::Result<()> {
    let mut storage = open_storage(&config.storage).context("Failed to open storage")?;
    let previous = storage.load_progress()?;
    storage.save_progress(start)?;

    match previous {
        Some(previous) => tracing::info!("Checkpoint moved from {} to {}", previous, start),
        None => tracing::info!("Checkpoint set to {}", start),
    }
    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config, reset: Option<Coordinate>) -> anyhow::Result<()> {
    println!("=== Corpus Harvest Dry Run ===\n");

    println!("API:");
    println!("  Endpoint: {}", config.api.base_url);
    println!("  Book id: {}", config.api.book_id);
    println!("  Language: {}", config.api.language);
    let token = config.api.resolve_token()?;
    println!(
        "  Authentication: {}",
        if token.is_some() { "bearer token" } else { "none" }
    );

    println!("\nRetry Policy:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Base delay: {}ms", config.retry.base_delay_ms);
    println!("  Rate-limit delay: {}ms", config.retry.rate_limit_delay_ms);
    println!(
        "  Request interval: {}ms",
        config.traversal.request_interval_ms
    );

    println!("\nStorage ({:?}):", config.storage.backend);
    println!("  Pages: {}", config.storage.data_dir.display());
    println!("  State: {}", config.storage.state_dir.display());
    println!("  Database: {}", config.storage.database_path.display());

    let storage = open_storage(&config.storage).context("Failed to open storage")?;
    let start = match reset {
        Some(start) => start,
        None => storage.load_progress()?.unwrap_or(Coordinate::START),
    };

    println!("\n✓ Configuration is valid");
    println!("✓ Would start harvesting at {}", start);

    Ok(())
}

/// Handles the --status mode: shows progress from storage
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(&config.storage).context("Failed to open storage")?;
    let stats = load_statistics(storage.as_ref())?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the --extract mode: stored pages to records
fn handle_extract(config: &Config) -> anyhow::Result<()> {
    let storage = open_storage(&config.storage).context("Failed to open storage")?;
    let rules = ExtractRules::from_config(&config.extract)?;

    let records = extract_records(storage.as_ref(), &rules)?;
    write_records(&config.extract.records_path, &records)?;

    println!(
        "✓ Extracted {} records to {}",
        records.len(),
        config.extract.records_path.display()
    );
    Ok(())
}

/// Handles the --translate mode: records to translated records
async fn handle_translate(config: &Config) -> anyhow::Result<()> {
    let records = read_records(&config.extract.records_path).with_context(|| {
        format!(
            "Failed to read records from {} (run --extract first)",
            config.extract.records_path.display()
        )
    })?;
    let translator = translator_from_config(&config.translate)?;

    let report = translate_records(
        &records,
        translator.as_ref(),
        &config.translate.output_path,
        config.translate.flush_every,
    )
    .await?;

    println!(
        "✓ Translated {} records ({} reused, {} failed) to {}",
        report.translated,
        report.reused,
        report.failed,
        config.translate.output_path.display()
    );
    Ok(())
}

/// Handles the --export-index mode
fn handle_export_index(config: &Config) -> anyhow::Result<()> {
    let exported = export_index(config)?;
    println!(
        "✓ Exported {} documents to {}",
        exported,
        config.index.bulk_path.display()
    );
    Ok(())
}

/// Handles the main harvest operation
///
/// Exits with status 2 when the quota ran out, so wrappers can tell an
/// operator is needed.
async fn handle_harvest(config: &Config, config_hash: &str) -> anyhow::Result<ExitCode> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received; finishing the current coordinate");
            let _ = shutdown_tx.send(true);
        }
    });

    let report = match harvest(config, config_hash, shutdown_rx).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            return Err(e.into());
        }
    };

    println!(
        "Harvest {}: {} pages stored, {} gaps, resume point {}",
        match report.stop {
            HarvestStop::Stopped(reason) => reason.to_string(),
            HarvestStop::Interrupted => "interrupted".to_string(),
        },
        report.pages_stored,
        report.gaps.len(),
        report.checkpoint
    );

    match report.stop {
        HarvestStop::Stopped(StopReason::QuotaExhausted) => Ok(ExitCode::from(2)),
        _ => Ok(ExitCode::SUCCESS),
    }
}
