//! # case_ingest
//!
//! Collects public-health case-count data published by four agencies (CDC,
//! ECDC, PAHO, WHO), normalizes it to CSV/JSON, and stores every artifact
//! under a dated key and a "latest" key in an object store.
//!
//! ## Usage
//!
//! ```sh
//! case_ingest ingest --ecdc --who
//! case_ingest list ecdc
//! case_ingest tweet --date 2022-07-02
//! case_ingest aggregate https://example.org/linelist.csv
//! ```
//!
//! ## Architecture
//!
//! Each agency runs the same linear pipeline:
//! 1. **Fetching**: GET (or POST for WHO) the configured endpoint
//! 2. **Parsing**: HTML with a strict parser and a lenient fallback
//! 3. **Extraction**: per-division JSON blobs, one regex per division
//! 4. **Output**: CSV (and JSON for WHO) written under dated and latest keys
//!
//! Agencies run one after another. A failing agency is logged with its stage
//! and does not stop the others; the process still exits non-zero.
//!
//! The `aggregate` command is separate: it archives a case line list and
//! writes total and per-country counts to the aggregates bucket.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod browse;
mod cli;
mod config;
mod countries;
mod error;
mod fetch;
mod linelist;
mod models;
mod outputs;
mod pipeline;
mod scrapers;
mod social;
mod storage;
mod utils;

use cli::{Cli, Command};
use config::Config;
use fetch::HttpFetcher;
use pipeline::Pipeline;
use storage::LocalStore;
use utils::today_utc;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("case_ingest starting up");

    let args = Cli::parse();
    debug!(command = ?args.command, config = ?args.config, "Parsed CLI arguments");

    let config = Config::load(args.config.as_deref(), &args.settings).inspect_err(|e| {
        error!(error = %e, "Failed to load configuration");
    })?;

    match args.command {
        Command::Ingest(selection) => {
            let agencies = selection.agencies();
            config.validate_for_ingest(&agencies)?;
            let fetcher = HttpFetcher::new(config.http_timeout())?;
            let store = build_store(&config)?;
            let date = today_utc();
            info!(?agencies, %date, "Starting ingestion");

            let report = Pipeline::new(&config, &fetcher, &store, date)
                .run(&agencies)
                .await;
            if !report.is_success() {
                let failed: Vec<String> = report
                    .failed
                    .iter()
                    .map(|(agency, e)| format!("{agency} ({} stage): {e}", e.stage()))
                    .collect();
                return Err(format!("ingestion failed for {}", failed.join("; ")).into());
            }
        }
        Command::List { folder, presigned } => {
            config.validate_for_listing(folder.as_deref())?;
            match folder {
                None => {
                    for entry in browse::folders(&config) {
                        println!("{}\t{}", entry.name, entry.folder);
                    }
                }
                Some(folder) => {
                    let store = build_store(&config)?;
                    let bucket = config.require_bucket()?;
                    for file in browse::list_files(&store, bucket, &folder).await? {
                        let url = if presigned {
                            browse::presigned_url(&store, bucket, &folder, &file)?
                        } else {
                            browse::object_url(&store, bucket, &folder, &file)?
                        };
                        println!("{file}\t{url}");
                    }
                }
            }
        }
        Command::Tweet { date } => {
            let ts_url = config.require_ts_data_url()?;
            let fetcher = HttpFetcher::new(config.http_timeout())?;
            let date = date.unwrap_or_else(today_utc);
            let post =
                social::build_post(&fetcher, ts_url, date, &config.endemic_countries).await?;
            info!(%date, chars = post.chars().count(), "Post ready");
            println!("{post}");
        }
        Command::Aggregate { source, date } => {
            config.validate_for_aggregate()?;
            let fetcher = HttpFetcher::new(config.http_timeout())?;
            let store = build_store(&config)?;
            let date = date.unwrap_or_else(today_utc);
            let aggregates = linelist::run(
                &fetcher,
                &store,
                &source,
                config.require_bucket()?,
                config.linelist_folder(),
                config.require_aggregates_bucket()?,
                date,
            )
            .await
            .inspect_err(|e| error!(stage = e.stage(), error = %e, "Aggregation failed"))?;
            println!("{}", outputs::json::to_json(&aggregates.total)?);
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn build_store(config: &Config) -> error::Result<LocalStore> {
    let store = LocalStore::new(config.require_storage_root()?);
    match config.public_base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(base) => store.with_public_base_url(base),
        None => Ok(store),
    }
}
