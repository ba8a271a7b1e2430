//! ECDC report page scraper.
//!
//! The report page renders each chart from an htmlwidgets JSON blob embedded
//! in a `<script>` tag inside the chart's `<div>`. The blob's `x.data` list
//! holds one group per trace, and each group's `text` field carries the
//! hover labels, which are little HTML snippets such as:
//!
//! ```text
//! Date: 2022-07-01<br />count:   12<br />ReportingCountry: Spain
//! ```
//!
//! A trace with a single point stores `text` as a bare string instead of a
//! one-element list; both shapes are accepted.

use crate::error::{IngestError, Result};
use crate::models::{Division, Record};
use crate::scrapers::html::{find_by_id, first_script};
use crate::utils::truncate_for_log;
use scraper::Html;
use serde_json::Value;
use tracing::{debug, error, info, instrument};

/// Pull the embedded JSON payload out of `division`'s `<div>`.
#[instrument(level = "info", skip(doc), fields(division = %division))]
pub fn division_json(doc: &Html, division: Division) -> Result<Value> {
    let div = find_by_id(doc, division.id())
        .ok_or_else(|| IngestError::DivisionNotFound(division.id().to_string()))?;
    let script =
        first_script(div).ok_or_else(|| IngestError::NoEmbeddedData(division.id().to_string()))?;
    let text: String = script.text().collect();
    if text.trim().is_empty() {
        return Err(IngestError::NoEmbeddedData(division.id().to_string()));
    }
    serde_json::from_str(&text).map_err(|e| {
        error!(error = %e, "Could not decode JSON from <script>");
        IngestError::Json(e)
    })
}

/// Flatten `x.data[*].text` into individual lines.
pub fn text_lines(payload: &Value) -> Result<Vec<&str>> {
    let groups = payload
        .pointer("/x/data")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::MalformedPayload("missing x.data list".to_string()))?;

    let mut lines = Vec::new();
    for group in groups {
        match group.get("text") {
            Some(Value::String(s)) => lines.push(s.as_str()),
            Some(Value::Array(items)) => lines.extend(items.iter().filter_map(Value::as_str)),
            _ => debug!("Group without text labels"),
        }
    }
    Ok(lines)
}

/// Turn a decoded payload into records for `division`.
///
/// Lines that do not match the division's pattern are skipped.
pub fn process_json(payload: &Value, division: Division) -> Result<Vec<Record>> {
    let lines = text_lines(payload)?;
    let total = lines.len();
    let records: Vec<Record> = lines
        .into_iter()
        .filter_map(|line| {
            let parsed = division.parse_line(line);
            if parsed.is_none() {
                debug!(
                    %division,
                    line = %truncate_for_log(line, 120),
                    "Skipping line that does not match pattern"
                );
            }
            parsed
        })
        .collect();
    info!(
        %division,
        lines = total,
        records = records.len(),
        skipped = total - records.len(),
        "Extracted records"
    );
    Ok(records)
}

/// Locate, decode and parse one division of an already-parsed page.
pub fn extract_records(doc: &Html, division: Division) -> Result<Vec<Record>> {
    let payload = division_json(doc, division)?;
    process_json(&payload, division)
}
