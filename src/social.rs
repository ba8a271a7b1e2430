//! Daily "new confirmed cases" post.
//!
//! Reads the cumulative-cases timeseries, compares each country's count for
//! the reference day against the day before, and lists the countries whose
//! count went up. More than five such countries → only the five largest
//! increases are listed.
//!
//! Posting the text is left to whoever runs the command; it is printed to
//! stdout.

use crate::countries;
use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use chrono::{Duration, NaiveDate};
use itertools::Itertools;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::{info, instrument, warn};

pub const TOP_N: usize = 5;
const HEADER: &str = "New confirmed Monkeypox cases:";
const HEADER_TOP: &str = "New confirmed Monkeypox cases (top 5):";
const FOOTER: &str = "Data and repo: https://github.com/globaldothealth/monkeypox\n\
                      Interactive map: https://map.monkeypox.global.health";

/// Cumulative counts for one country on the reference day and the day
/// before.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DailyCounts {
    pub today: Option<i64>,
    pub yesterday: Option<i64>,
}

impl DailyCounts {
    /// Increase over the previous day, when both days are known and non-zero
    /// and the count went up.
    pub fn increase(&self) -> Option<i64> {
        match (self.today, self.yesterday) {
            (Some(t), Some(y)) if t > 0 && y > 0 && t > y => Some(t - y),
            _ => None,
        }
    }
}

fn count_of(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Group timeseries rows by alpha-2 code.
///
/// Rows for `excluded` countries are dropped; rows whose country has no ISO
/// code are logged and dropped.
pub fn collect_counts(
    rows: &[Value],
    today: NaiveDate,
    excluded: &[String],
) -> BTreeMap<&'static str, DailyCounts> {
    let today_str = today.format("%Y-%m-%d").to_string();
    let yesterday_str = (today - Duration::days(1)).format("%Y-%m-%d").to_string();
    let mut counts: BTreeMap<&'static str, DailyCounts> = BTreeMap::new();

    for row in rows {
        let country = row.get("Country").and_then(Value::as_str).unwrap_or("").trim();
        if excluded.iter().any(|e| e.trim().eq_ignore_ascii_case(country)) {
            continue;
        }
        let Some(code) = countries::alpha2(country) else {
            warn!(%country, "No ISO 3166 country");
            continue;
        };
        let entry = counts.entry(code).or_default();
        let date = row.get("Date").and_then(Value::as_str).unwrap_or("");
        let cases = count_of(row.get("Cumulative_cases"));
        if date.starts_with(&today_str) {
            entry.today = cases.or(Some(0));
        } else if date.starts_with(&yesterday_str) {
            entry.yesterday = cases.or(Some(0));
        }
    }
    counts
}

/// Countries with a known increase, as `(code, today, increase)`, largest
/// increase first, ties in code order.
pub fn increases(counts: &BTreeMap<&'static str, DailyCounts>) -> Vec<(&'static str, i64, i64)> {
    counts
        .iter()
        .filter_map(|(code, c)| Some((*code, c.today?, c.increase()?)))
        .sorted_by(|a, b| b.2.cmp(&a.2).then(a.0.cmp(b.0)))
        .collect()
}

/// Render the post text.
pub fn compose(increases: &[(&'static str, i64, i64)]) -> String {
    let (header, shown) = if increases.len() > TOP_N {
        (HEADER_TOP, &increases[..TOP_N])
    } else {
        (HEADER, increases)
    };
    let mut post = format!("{header}\n\n");
    for &(code, today, diff) in shown {
        let name = countries::display_name(code).unwrap_or(code);
        let _ = write!(post, "{name} ");
        if let Some(flag) = countries::flag(code) {
            let _ = write!(post, "{flag}: ");
        }
        let _ = writeln!(post, "+{diff} ({today})");
    }
    post.push('\n');
    post.push_str(FOOTER);
    post
}

/// Fetch the timeseries and compose the post for `today`.
#[instrument(level = "info", skip(fetcher, excluded))]
pub async fn build_post<F: Fetch>(
    fetcher: &F,
    ts_url: &str,
    today: NaiveDate,
    excluded: &[String],
) -> Result<String> {
    let body = fetcher.get_text(ts_url).await?;
    let rows: Vec<Value> = match serde_json::from_str(&body)? {
        Value::Array(rows) => rows,
        _ => {
            return Err(IngestError::MalformedPayload(
                "timeseries is not a JSON list".into(),
            ));
        }
    };
    let counts = collect_counts(&rows, today, excluded);
    let ups = increases(&counts);
    if ups.is_empty() {
        warn!(countries = counts.len(), "No country reported an increase");
    }
    info!(rows = rows.len(), countries = ups.len(), "Composed post");
    Ok(compose(&ups))
}
