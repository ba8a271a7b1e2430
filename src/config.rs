//! Runtime configuration.
//!
//! [`Config`] is assembled once at startup from an optional YAML file and the
//! CLI/environment [`Settings`], then handed to each stage explicitly. The
//! `require_*` accessors turn a missing value into
//! [`IngestError::Config`] naming the field, so a command fails before it
//! touches the network.

use crate::cli::Settings;
use crate::error::{IngestError, Result};
use crate::models::Agency;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

pub const DEFAULT_ECDC_ENDPOINT: &str = "https://monkeypoxreport.ecdc.europa.eu";
pub const DEFAULT_PAHO_ENDPOINT: &str = "https://shiny.pahobra.org/monkeypox/";
pub const DEFAULT_STORAGE_ROOT: &str = "./storage";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cdc_endpoint: Option<String>,
    pub ecdc_endpoint: Option<String>,
    pub paho_endpoint: Option<String>,
    pub who_endpoint: Option<String>,
    pub data_bucket: Option<String>,
    pub cdc_data_folder: Option<String>,
    pub ecdc_data_folder: Option<String>,
    pub paho_data_folder: Option<String>,
    pub who_data_folder: Option<String>,
    pub storage_root: Option<String>,
    pub public_base_url: Option<String>,
    pub ts_data_url: Option<String>,
    pub aggregates_bucket: Option<String>,
    pub linelist_folder: Option<String>,
    pub endemic_countries: Vec<String>,
    pub http_timeout_secs: Option<u64>,
}

impl Config {
    /// Load the YAML file (if any), overlay CLI/env settings, then fill the
    /// built-in defaults.
    #[instrument(level = "info", skip(settings))]
    pub fn load(path: Option<&str>, settings: &Settings) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_yaml_file(Path::new(p))?,
            None => Self::default(),
        };
        let config = base.overlay(settings).with_defaults();
        debug!(?config, "Resolved configuration");
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&raw)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw).map_err(|e| IngestError::Config(format!("invalid YAML: {e}")))
    }

    /// Values set in `settings` replace the ones in `self`.
    pub fn overlay(self, settings: &Settings) -> Self {
        let pick = |over: &Option<String>, base: Option<String>| over.clone().or(base);
        Self {
            cdc_endpoint: pick(&settings.cdc_endpoint, self.cdc_endpoint),
            ecdc_endpoint: pick(&settings.ecdc_endpoint, self.ecdc_endpoint),
            paho_endpoint: pick(&settings.paho_endpoint, self.paho_endpoint),
            who_endpoint: pick(&settings.who_endpoint, self.who_endpoint),
            data_bucket: pick(&settings.data_bucket, self.data_bucket),
            cdc_data_folder: pick(&settings.cdc_data_folder, self.cdc_data_folder),
            ecdc_data_folder: pick(&settings.ecdc_data_folder, self.ecdc_data_folder),
            paho_data_folder: pick(&settings.paho_data_folder, self.paho_data_folder),
            who_data_folder: pick(&settings.who_data_folder, self.who_data_folder),
            storage_root: pick(&settings.storage_root, self.storage_root),
            public_base_url: pick(&settings.public_base_url, self.public_base_url),
            ts_data_url: pick(&settings.ts_data_url, self.ts_data_url),
            aggregates_bucket: pick(&settings.aggregates_bucket, self.aggregates_bucket),
            linelist_folder: pick(&settings.linelist_folder, self.linelist_folder),
            endemic_countries: if settings.endemic_countries.is_empty() {
                self.endemic_countries
            } else {
                settings.endemic_countries.clone()
            },
            http_timeout_secs: settings.http_timeout_secs.or(self.http_timeout_secs),
        }
    }

    fn with_defaults(mut self) -> Self {
        self.ecdc_endpoint
            .get_or_insert_with(|| DEFAULT_ECDC_ENDPOINT.to_string());
        self.paho_endpoint
            .get_or_insert_with(|| DEFAULT_PAHO_ENDPOINT.to_string());
        self.storage_root
            .get_or_insert_with(|| DEFAULT_STORAGE_ROOT.to_string());
        self
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    pub fn endpoint(&self, agency: Agency) -> Option<&str> {
        match agency {
            Agency::Cdc => self.cdc_endpoint.as_deref(),
            Agency::Ecdc => self.ecdc_endpoint.as_deref(),
            Agency::Paho => self.paho_endpoint.as_deref(),
            Agency::Who => self.who_endpoint.as_deref(),
        }
    }

    pub fn folder(&self, agency: Agency) -> Option<&str> {
        match agency {
            Agency::Cdc => self.cdc_data_folder.as_deref(),
            Agency::Ecdc => self.ecdc_data_folder.as_deref(),
            Agency::Paho => self.paho_data_folder.as_deref(),
            Agency::Who => self.who_data_folder.as_deref(),
        }
    }

    pub fn require_endpoint(&self, agency: Agency) -> Result<&str> {
        required(self.endpoint(agency), &format!("{}_endpoint", agency.slug()))
    }

    pub fn require_folder(&self, agency: Agency) -> Result<&str> {
        required(self.folder(agency), &format!("{}_data_folder", agency.slug()))
    }

    pub fn require_bucket(&self) -> Result<&str> {
        required(self.data_bucket.as_deref(), "data_bucket")
    }

    pub fn require_storage_root(&self) -> Result<&str> {
        required(self.storage_root.as_deref(), "storage_root")
    }

    pub fn require_public_base_url(&self) -> Result<&str> {
        required(self.public_base_url.as_deref(), "public_base_url")
    }

    pub fn require_ts_data_url(&self) -> Result<&str> {
        required(self.ts_data_url.as_deref(), "ts_data_url")
    }

    pub fn require_aggregates_bucket(&self) -> Result<&str> {
        required(self.aggregates_bucket.as_deref(), "aggregates_bucket")
    }

    /// Line-list archive folder; unset means the bucket root.
    pub fn linelist_folder(&self) -> &str {
        self.linelist_folder.as_deref().map_or("", str::trim)
    }

    /// Check everything the `ingest` command needs for `agencies`.
    pub fn validate_for_ingest(&self, agencies: &[Agency]) -> Result<()> {
        self.require_bucket()?;
        self.require_storage_root()?;
        for &agency in agencies {
            self.require_endpoint(agency)?;
            self.require_folder(agency)?;
        }
        Ok(())
    }

    /// Check everything the `aggregate` command needs.
    pub fn validate_for_aggregate(&self) -> Result<()> {
        self.require_bucket()?;
        self.require_aggregates_bucket()?;
        self.require_storage_root()?;
        Ok(())
    }

    /// Check everything the `list` command needs. The folder index comes
    /// from configuration alone; listing a folder reads the store.
    pub fn validate_for_listing(&self, folder: Option<&str>) -> Result<()> {
        if folder.is_none() {
            return Ok(());
        }
        self.require_bucket()?;
        self.require_storage_root()?;
        self.require_public_base_url()?;
        Ok(())
    }
}

fn required<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(IngestError::Config(format!("missing required setting `{name}`"))),
    }
}
