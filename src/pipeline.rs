//! Per-agency ingestion runs.
//!
//! Every agency goes through fetch → parse → extract → format → store, one
//! agency at a time in [`Agency::ALL`] order. A failing agency is logged with
//! the stage that failed and recorded in the [`RunReport`]; the remaining
//! agencies still run.

use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::fetch::{Fetch, Poller};
use crate::models::{Agency, Division, Record};
use crate::outputs::{csv, json};
use crate::scrapers::{cdc, ecdc, html, paho, who};
use crate::storage::{ArtifactKeys, ObjectStore, store_artifact};
use crate::utils::iso_date;
use chrono::NaiveDate;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Outcome of [`Pipeline::run`].
#[derive(Debug, Default)]
pub struct RunReport {
    pub succeeded: Vec<Agency>,
    pub failed: Vec<(Agency, IngestError)>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Pipeline<'a, F, S> {
    config: &'a Config,
    fetcher: &'a F,
    store: &'a S,
    poller: Poller,
    date: NaiveDate,
}

impl<'a, F: Fetch, S: ObjectStore> Pipeline<'a, F, S> {
    /// `date` names the dated artifacts of this run.
    pub fn new(config: &'a Config, fetcher: &'a F, store: &'a S, date: NaiveDate) -> Self {
        Self {
            config,
            fetcher,
            store,
            poller: Poller::default(),
            date,
        }
    }

    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    /// Ingest each of `agencies`, in processing order.
    pub async fn run(&self, agencies: &[Agency]) -> RunReport {
        let t0 = Instant::now();
        let mut ordered = agencies.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut report = RunReport::default();
        for agency in ordered {
            match self.ingest(agency).await {
                Ok(()) => {
                    info!(%agency, "Ingestion complete");
                    report.succeeded.push(agency);
                }
                Err(e) => {
                    error!(%agency, stage = e.stage(), error = %e, "Ingestion failed");
                    report.failed.push((agency, e));
                }
            }
        }
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Run finished"
        );
        report
    }

    pub async fn ingest(&self, agency: Agency) -> Result<()> {
        match agency {
            Agency::Cdc => self.ingest_cdc().await,
            Agency::Ecdc => self.ingest_ecdc().await,
            Agency::Paho => self.ingest_paho().await,
            Agency::Who => self.ingest_who().await,
        }
    }

    fn target(&self, agency: Agency) -> Result<(&'a str, &'a str)> {
        Ok((self.config.require_bucket()?, self.config.require_folder(agency)?))
    }

    /// Every division is attempted; the first failure is returned once all
    /// of them have run.
    #[instrument(level = "info", skip(self))]
    async fn ingest_ecdc(&self) -> Result<()> {
        let url = self.config.require_endpoint(Agency::Ecdc)?;
        let (bucket, folder) = self.target(Agency::Ecdc)?;
        let page = self.fetcher.get_text(url).await?;

        // The parsed document stays in this block; only records cross the
        // store awaits below.
        let extracted: Vec<(Division, Result<Vec<Record>>)> = {
            let doc = html::make_document(&page)?;
            Division::ALL
                .into_iter()
                .map(|division| (division, ecdc::extract_records(&doc, division)))
                .collect()
        };

        let date = iso_date(self.date);
        let mut first_err = None;
        for (division, result) in extracted {
            let outcome = match result {
                Ok(records) => {
                    let body = csv::records_to_csv(&records, division.fields());
                    let keys = ArtifactKeys::new(
                        folder,
                        &format!("{date}_{}.csv", division.id()),
                        &format!("ecdc_{}_latest.csv", division.id()),
                    );
                    store_artifact(self.store, bucket, &keys, body.as_bytes()).await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                error!(%division, stage = e.stage(), error = %e, "Division failed");
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    #[instrument(level = "info", skip(self))]
    async fn ingest_cdc(&self) -> Result<()> {
        let url = self.config.require_endpoint(Agency::Cdc)?;
        let (bucket, folder) = self.target(Agency::Cdc)?;
        let table = cdc::fetch_table(self.fetcher, url).await?;
        let keys = ArtifactKeys::new(folder, &format!("{}.csv", iso_date(self.date)), "cdc_latest.csv");
        store_artifact(self.store, bucket, &keys, csv::table_to_csv(&table).as_bytes()).await
    }

    #[instrument(level = "info", skip(self))]
    async fn ingest_who(&self) -> Result<()> {
        let url = self.config.require_endpoint(Agency::Who)?;
        let (bucket, folder) = self.target(Agency::Who)?;
        let rows = who::fetch_data(self.fetcher, url).await?;
        let date = iso_date(self.date);

        let table = who::to_table(&rows);
        let keys = ArtifactKeys::new(folder, &format!("{date}.csv"), "who_latest.csv");
        store_artifact(self.store, bucket, &keys, csv::table_to_csv(&table).as_bytes()).await?;

        let body = json::to_json(&rows)?;
        let keys = ArtifactKeys::new(folder, &format!("{date}.json"), "who_latest.json");
        store_artifact(self.store, bucket, &keys, body.as_bytes()).await
    }

    #[instrument(level = "info", skip(self))]
    async fn ingest_paho(&self) -> Result<()> {
        let url = self.config.require_endpoint(Agency::Paho)?;
        let (bucket, folder) = self.target(Agency::Paho)?;
        let date = iso_date(self.date);
        for (id, name) in paho::DOWNLOADS {
            let link = paho::discover_link(self.fetcher, &self.poller, url, id).await?;
            let body = self.fetcher.get_bytes(&link).await?;
            if body.is_empty() {
                error!(%link, "PAHO download was empty");
                return Err(IngestError::EmptyDataset(format!("paho {name}")));
            }
            let keys = ArtifactKeys::new(
                folder,
                &format!("{date}_{name}.csv"),
                &format!("paho_{name}_latest.csv"),
            );
            store_artifact(self.store, bucket, &keys, &body).await?;
        }
        Ok(())
    }
}
