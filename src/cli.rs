//! Command-line interface definitions for case_ingest.
//!
//! Every setting can come from a flag, an environment variable, or the YAML
//! file passed with `--config`. Flags and environment variables win over the
//! file.

use crate::models::Agency;
use clap::{Args, Parser, Subcommand};

/// Command-line arguments for case_ingest.
///
/// # Examples
///
/// ```sh
/// # Ingest ECDC and WHO data
/// case_ingest ingest --ecdc --who
///
/// # List files stored for ECDC with download links
/// case_ingest list ecdc
///
/// # Compose today's new-cases post
/// case_ingest tweet
///
/// # Archive and aggregate a case line list
/// case_ingest aggregate https://example.org/linelist.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "CASE_INGEST_CONFIG")]
    pub config: Option<String>,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch, normalize and store agency data
    Ingest(IngestArgs),
    /// List stored files with download links; without a folder, list folders
    List {
        /// Folder to list
        folder: Option<String>,
        /// Print presigned download URLs instead of object URLs
        #[arg(long)]
        presigned: bool,
    },
    /// Compose the daily "new confirmed cases" post from timeseries data
    Tweet {
        /// Reference date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// Archive a case line list and store per-country aggregates
    Aggregate {
        /// Line list URL or file path (CSV, or a JSON list of objects)
        #[arg(env = "LINELIST_SOURCE")]
        source: String,
        /// Date stamped on the archive and the country aggregates; defaults to today
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
}

/// Agency selection. At least one flag is required.
#[derive(Args, Debug, Default, Clone)]
#[group(required = true, multiple = true)]
pub struct IngestArgs {
    /// Ingest CDC data
    #[arg(long)]
    pub cdc: bool,
    /// Ingest ECDC data
    #[arg(long)]
    pub ecdc: bool,
    /// Ingest PAHO data
    #[arg(long)]
    pub paho: bool,
    /// Ingest WHO data
    #[arg(long)]
    pub who: bool,
}

impl IngestArgs {
    /// Selected agencies in processing order.
    pub fn agencies(&self) -> Vec<Agency> {
        Agency::ALL
            .into_iter()
            .filter(|a| match a {
                Agency::Cdc => self.cdc,
                Agency::Ecdc => self.ecdc,
                Agency::Paho => self.paho,
                Agency::Who => self.who,
            })
            .collect()
    }
}

/// Endpoint, storage and HTTP settings. All optional here; validation of
/// what a command actually needs happens in [`crate::config::Config`].
#[derive(Args, Debug, Default, Clone)]
pub struct Settings {
    /// CDC CSV endpoint
    #[arg(long, env = "CDC_ENDPOINT")]
    pub cdc_endpoint: Option<String>,

    /// ECDC report page
    #[arg(long, env = "ECDC_ENDPOINT")]
    pub ecdc_endpoint: Option<String>,

    /// PAHO dashboard page
    #[arg(long, env = "PAHO_ENDPOINT")]
    pub paho_endpoint: Option<String>,

    /// WHO data endpoint (POST)
    #[arg(long, env = "WHO_ENDPOINT")]
    pub who_endpoint: Option<String>,

    /// Bucket that receives all artifacts
    #[arg(long, env = "DATA_BUCKET")]
    pub data_bucket: Option<String>,

    #[arg(long, env = "CDC_DATA_FOLDER")]
    pub cdc_data_folder: Option<String>,

    #[arg(long, env = "ECDC_DATA_FOLDER")]
    pub ecdc_data_folder: Option<String>,

    #[arg(long, env = "PAHO_DATA_FOLDER")]
    pub paho_data_folder: Option<String>,

    #[arg(long, env = "WHO_DATA_FOLDER")]
    pub who_data_folder: Option<String>,

    /// Root directory of the local object store
    #[arg(long, env = "STORAGE_ROOT")]
    pub storage_root: Option<String>,

    /// Base URL under which stored objects are served
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Timeseries JSON endpoint used by `tweet`
    #[arg(long, env = "TS_DATA_URL")]
    pub ts_data_url: Option<String>,

    /// Bucket that receives the total and per-country aggregates
    #[arg(long, env = "AGGREGATES_BUCKET")]
    pub aggregates_bucket: Option<String>,

    /// Folder for line-list archives inside the data bucket
    #[arg(long, env = "LINELIST_FOLDER")]
    pub linelist_folder: Option<String>,

    /// Countries left out of the daily post (comma-separated)
    #[arg(long, env = "ENDEMIC_COUNTRIES", value_delimiter = ',')]
    pub endemic_countries: Vec<String>,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,
}
