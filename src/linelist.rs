//! Case line list: cleaning, archiving and per-country aggregates.
//!
//! The line list is one row per reported case, published as CSV or as a
//! JSON list of objects. The `aggregate` command loads it, adds an ISO 3166
//! alpha-3 column, archives it, and writes two summary files:
//!
//! ```text
//! {data_bucket}/{linelist_folder}/archives/{date}.csv | {date}.json
//! {data_bucket}/{linelist_folder}/latest.csv | latest.json
//! {aggregates_bucket}/total/latest.json      {"total":N,"confirmed":N}
//! {aggregates_bucket}/country/latest.json    {"{date}":[{"Spain":{"confirmed":N,"suspected":N}}, ...]}
//! ```
//!
//! Excluded and discarded cases are left out of every count. A status
//! outside the known set is logged and still counted in the total.

use crate::countries;
use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use crate::models::Table;
use crate::outputs::{csv, json};
use crate::storage::{ArtifactKeys, ObjectStore, store_artifact};
use crate::utils::iso_date;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

/// One line-list row, columns in source order.
pub type Case = Map<String, Value>;

pub const COUNTRY: &str = "Country";
pub const STATUS: &str = "Status";
pub const COUNTRY_ISO3: &str = "Country_ISO3";

/// Curation columns that are not published.
const INTERNAL_COLUMNS: [&str; 2] = ["Curator_initials", "Notes"];

/// Constituent countries reported on their own but coded as the UK.
const ISO3_QUIRKS: &[(&str, &str)] = &[
    ("england", "GBR"),
    ("scotland", "GBR"),
    ("northern ireland", "GBR"),
    ("wales", "GBR"),
];

const KNOWN_STATUSES: [&str; 4] = ["suspected", "confirmed", "excluded", "discarded"];

/// ISO 3166-1 alpha-3 code for a line-list country, or `""` when there is
/// none.
pub fn lookup_iso3(country: Option<&str>) -> &'static str {
    let Some(country) = country.map(str::trim).filter(|c| !c.is_empty()) else {
        return "";
    };
    let lower = country.to_lowercase();
    if let Some(&(_, code)) = ISO3_QUIRKS.iter().find(|(name, _)| *name == lower) {
        return code;
    }
    countries::alpha3(country).unwrap_or_else(|| {
        warn!(%country, "No ISO3 code found for country");
        ""
    })
}

/// Add `Country_ISO3` to every case and drop the internal curation columns.
pub fn clean(cases: &mut [Case]) {
    for case in cases.iter_mut() {
        let iso3 = lookup_iso3(case.get(COUNTRY).and_then(Value::as_str));
        case.insert(COUNTRY_ISO3.to_string(), Value::from(iso3));
        for column in INTERNAL_COLUMNS {
            case.shift_remove(column);
        }
    }
    info!(cases = cases.len(), "Cleaned line list");
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Line list as a table. Columns are the first case's keys; a case missing
/// one of them gets an empty cell.
pub fn to_table(cases: &[Case]) -> Table {
    let headers: Vec<String> = cases
        .first()
        .map(|case| case.keys().cloned().collect())
        .unwrap_or_default();
    let rows = cases
        .iter()
        .map(|case| {
            headers
                .iter()
                .map(|h| case.get(h).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    Table { headers, rows }
}

/// Parse a line list. A body starting with `[` is a JSON list of objects,
/// anything else is CSV with a header row.
pub fn parse(body: &str) -> Result<Vec<Case>> {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    let table = csv::parse_table(body);
    let cases: Vec<Case> = table
        .rows
        .into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            table
                .headers
                .iter()
                .map(|h| (h.clone(), Value::String(cells.next().unwrap_or_default())))
                .collect()
        })
        .collect();
    Ok(cases)
}

/// Read the line list from an `http(s)` URL or a local file.
#[instrument(level = "info", skip(fetcher))]
pub async fn load<F: Fetch>(fetcher: &F, source: &str) -> Result<Vec<Case>> {
    let body = if source.starts_with("http://") || source.starts_with("https://") {
        fetcher.get_text(source).await?
    } else {
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| IngestError::Read {
                path: source.to_string(),
                source: e,
            })?
    };
    let cases = parse(&body)?;
    if cases.is_empty() {
        return Err(IngestError::EmptyDataset("line list".into()));
    }
    info!(cases = cases.len(), "Loaded line list");
    Ok(cases)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TotalCount {
    pub total: u64,
    pub confirmed: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountryCount {
    pub confirmed: u64,
    pub suspected: u64,
}

/// Counts over the cases that are not excluded or discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregates {
    pub total: TotalCount,
    /// Countries in order of first appearance.
    pub by_country: Vec<(String, CountryCount)>,
}

impl Aggregates {
    /// `{"{date}": [{"{country}": {"confirmed": N, "suspected": N}}, ...]}`
    pub fn country_json(&self, date: NaiveDate) -> Value {
        let entries: Vec<Value> = self
            .by_country
            .iter()
            .map(|(country, counts)| {
                let counts = Map::from_iter([
                    ("confirmed".to_string(), Value::from(counts.confirmed)),
                    ("suspected".to_string(), Value::from(counts.suspected)),
                ]);
                let mut entry = Map::new();
                entry.insert(country.clone(), Value::Object(counts));
                Value::Object(entry)
            })
            .collect();
        let mut out = Map::new();
        out.insert(iso_date(date), Value::Array(entries));
        Value::Object(out)
    }
}

fn required_text<'a>(case: &'a Case, column: &str, index: usize) -> Result<&'a str> {
    match case.get(column).and_then(Value::as_str).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(IngestError::MalformedPayload(format!(
            "no {} found for case {index}",
            column.to_lowercase()
        ))),
    }
}

/// Count cases per country and overall. Every case needs a country and a
/// status.
pub fn aggregate(cases: &[Case]) -> Result<Aggregates> {
    let mut agg = Aggregates::default();
    for (index, case) in cases.iter().enumerate() {
        let country = required_text(case, COUNTRY, index)?;
        let status = required_text(case, STATUS, index)?;
        if !KNOWN_STATUSES.contains(&status) {
            warn!(index, %status, "Unknown case status");
        }
        if matches!(status, "excluded" | "discarded") {
            continue;
        }

        let pos = match agg.by_country.iter().position(|(c, _)| c == country) {
            Some(pos) => pos,
            None => {
                agg.by_country.push((country.to_string(), CountryCount::default()));
                agg.by_country.len() - 1
            }
        };
        let counts = &mut agg.by_country[pos].1;
        match status {
            "confirmed" => {
                counts.confirmed += 1;
                agg.total.confirmed += 1;
            }
            "suspected" => counts.suspected += 1,
            _ => {}
        }
        agg.total.total += 1;
    }
    debug!(total = agg.total.total, countries = agg.by_country.len(), "Aggregated cases");
    Ok(agg)
}

/// Archive the cleaned line list as CSV and JSON, each under a dated key
/// and `latest`.
#[instrument(level = "info", skip(store, cases), fields(cases = cases.len()))]
pub async fn store_line_list<S: ObjectStore>(
    store: &S,
    bucket: &str,
    folder: &str,
    date: NaiveDate,
    cases: &[Case],
) -> Result<()> {
    let date = iso_date(date);
    let csv_body = csv::table_to_csv(&to_table(cases));
    let json_body = json::to_json(cases)?;
    for (ext, body) in [("csv", csv_body), ("json", json_body)] {
        let keys = ArtifactKeys::new(
            folder,
            &format!("archives/{date}.{ext}"),
            &format!("latest.{ext}"),
        );
        store_artifact(store, bucket, &keys, body.as_bytes()).await?;
    }
    Ok(())
}

/// Write the total and per-country summary files.
#[instrument(level = "info", skip(store, aggregates))]
pub async fn store_aggregates<S: ObjectStore>(
    store: &S,
    bucket: &str,
    date: NaiveDate,
    aggregates: &Aggregates,
) -> Result<()> {
    let total = json::to_json(&aggregates.total)?;
    let by_country = json::to_json(&aggregates.country_json(date))?;
    for (key, body) in [("total/latest.json", total), ("country/latest.json", by_country)] {
        store.put(bucket, key, body.as_bytes()).await?;
        info!(%bucket, %key, "Stored aggregate");
    }
    Ok(())
}

/// Load, clean, count and store. Counting happens before anything is
/// written, so a case without a country or status stores nothing.
#[instrument(level = "info", skip(fetcher, store))]
pub async fn run<F: Fetch, S: ObjectStore>(
    fetcher: &F,
    store: &S,
    source: &str,
    data_bucket: &str,
    folder: &str,
    aggregates_bucket: &str,
    date: NaiveDate,
) -> Result<Aggregates> {
    let mut cases = load(fetcher, source).await?;
    clean(&mut cases);
    let aggregates = aggregate(&cases)?;
    store_line_list(store, data_bucket, folder, date, &cases).await?;
    store_aggregates(store, aggregates_bucket, date, &aggregates).await?;
    info!(
        total = aggregates.total.total,
        confirmed = aggregates.total.confirmed,
        "Line list aggregated"
    );
    Ok(aggregates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::StubFetcher;
    use crate::storage::memory::MemoryStore;
    use serde_json::json;

    fn case(country: &str, status: &str) -> Case {
        match json!({"Country": country, "Status": status}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 7, 1).unwrap()
    }

    #[test]
    fn test_iso3_quirks_map_to_gbr() {
        assert_eq!(lookup_iso3(Some("England")), "GBR");
        assert_eq!(lookup_iso3(Some("scotland")), "GBR");
        assert_eq!(lookup_iso3(Some("Northern Ireland")), "GBR");
        assert_eq!(lookup_iso3(Some(" WALES ")), "GBR");
    }

    #[test]
    fn test_iso3_lookup() {
        assert_eq!(lookup_iso3(Some("Spain")), "ESP");
        assert_eq!(lookup_iso3(Some("United States")), "USA");
        assert_eq!(lookup_iso3(Some("Atlantis")), "");
        assert_eq!(lookup_iso3(Some("")), "");
        assert_eq!(lookup_iso3(None), "");
    }

    #[test]
    fn test_clean_adds_iso3_and_drops_internal_columns() {
        let mut cases: Vec<Case> = serde_json::from_str(
            r#"[{"ID":"1","Country":"Wales","Curator_initials":"AB","Status":"confirmed","Notes":"x"}]"#,
        )
        .unwrap();
        clean(&mut cases);
        let keys: Vec<&str> = cases[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ID", "Country", "Status", "Country_ISO3"]);
        assert_eq!(cases[0][COUNTRY_ISO3], "GBR");
    }

    #[test]
    fn test_aggregate_skips_excluded_and_discarded() {
        let cases = vec![
            case("Spain", "confirmed"),
            case("Germany", "suspected"),
            case("Spain", "excluded"),
            case("Spain", "suspected"),
            case("Peru", "discarded"),
            case("Spain", "confirmed"),
        ];
        let agg = aggregate(&cases).unwrap();
        assert_eq!(agg.total, TotalCount { total: 4, confirmed: 2 });
        assert_eq!(
            agg.by_country,
            vec![
                ("Spain".to_string(), CountryCount { confirmed: 2, suspected: 1 }),
                ("Germany".to_string(), CountryCount { confirmed: 0, suspected: 1 }),
            ]
        );
    }

    #[test]
    fn test_unknown_status_still_counted() {
        let agg = aggregate(&[case("Spain", "pending")]).unwrap();
        assert_eq!(agg.total, TotalCount { total: 1, confirmed: 0 });
        assert_eq!(agg.by_country, vec![("Spain".to_string(), CountryCount::default())]);
    }

    #[test]
    fn test_missing_country_or_status_is_error() {
        let err = aggregate(&[case("Spain", "confirmed"), case("", "confirmed")]).unwrap_err();
        assert_eq!(err.to_string(), "malformed payload: no country found for case 1");

        let mut no_status = case("Spain", "confirmed");
        no_status.shift_remove(STATUS);
        let err = aggregate(&[no_status]).unwrap_err();
        assert!(err.to_string().contains("no status"));
    }

    #[test]
    fn test_country_json_shape() {
        let agg = aggregate(&[case("Spain", "confirmed"), case("Peru", "suspected")]).unwrap();
        assert_eq!(
            json::to_json(&agg.country_json(day())).unwrap(),
            r#"{"2022-07-01":[{"Spain":{"confirmed":1,"suspected":0}},{"Peru":{"confirmed":0,"suspected":1}}]}"#
        );
        assert_eq!(json::to_json(&agg.total).unwrap(), r#"{"total":2,"confirmed":1}"#);
    }

    #[test]
    fn test_parse_csv_and_json() {
        let from_csv = parse("Country,Status\nSpain,confirmed\nPeru,\n").unwrap();
        assert_eq!(from_csv.len(), 2);
        assert_eq!(from_csv[0][COUNTRY], "Spain");
        assert_eq!(from_csv[1][STATUS], "");

        let from_json = parse(r#" [{"Country":"Spain","Status":"confirmed","Age":34}]"#).unwrap();
        assert_eq!(from_json[0]["Age"], 34);
        assert!(parse("[1, 2]").is_err());
    }

    #[test]
    fn test_to_table_uses_first_case_columns() {
        let cases: Vec<Case> = serde_json::from_str(
            r#"[{"Country":"Spain","Age":34,"Status":"confirmed"},{"Status":"suspected","Country":"Peru"}]"#,
        )
        .unwrap();
        assert_eq!(
            csv::table_to_csv(&to_table(&cases)),
            "Country,Age,Status\nSpain,34,confirmed\nPeru,,suspected\n"
        );
    }

    #[tokio::test]
    async fn test_run_stores_archive_and_aggregates() {
        let url = "https://example.org/linelist.csv";
        let fetcher = StubFetcher::default().with_text(
            url,
            "Country,Status,Notes\nEngland,confirmed,x\nSpain,suspected,\nSpain,excluded,\n",
        );
        let store = MemoryStore::default();

        let agg = run(&fetcher, &store, url, "data", "linelist", "aggregates", day())
            .await
            .unwrap();
        assert_eq!(agg.total, TotalCount { total: 2, confirmed: 1 });

        assert_eq!(
            store.get("data", "linelist/latest.csv").as_deref(),
            Some("Country,Status,Country_ISO3\nEngland,confirmed,GBR\nSpain,suspected,ESP\nSpain,excluded,ESP\n")
        );
        for key in [
            "linelist/archives/2022-07-01.csv",
            "linelist/archives/2022-07-01.json",
            "linelist/latest.json",
        ] {
            assert!(store.get("data", key).is_some(), "missing {key}");
        }
        assert_eq!(
            store.get("aggregates", "total/latest.json").as_deref(),
            Some(r#"{"total":2,"confirmed":1}"#)
        );
        assert_eq!(
            store.get("aggregates", "country/latest.json").as_deref(),
            Some(r#"{"2022-07-01":[{"England":{"confirmed":1,"suspected":0}},{"Spain":{"confirmed":0,"suspected":1}}]}"#)
        );
    }

    #[tokio::test]
    async fn test_run_stores_nothing_when_a_case_has_no_status() {
        let url = "https://example.org/linelist.json";
        let fetcher = StubFetcher::default()
            .with_text(url, r#"[{"Country":"Spain","Status":"confirmed"},{"Country":"Peru"}]"#);
        let store = MemoryStore::default();

        let err = run(&fetcher, &store, url, "data", "", "aggregates", day())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), "extract");
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linelist.csv");
        std::fs::write(&path, "Country,Status\nSpain,confirmed\n").unwrap();
        let cases = load(&StubFetcher::default(), path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(cases.len(), 1);

        let err = load(&StubFetcher::default(), "/nonexistent/linelist.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Read { .. }));

        std::fs::write(&path, "Country,Status\n").unwrap();
        let err = load(&StubFetcher::default(), path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::EmptyDataset(_)));
    }
}
