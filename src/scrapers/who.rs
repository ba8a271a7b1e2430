//! WHO case-count scraper.
//!
//! The WHO endpoint answers a POST with an empty JSON object by returning
//! `{"Data": [{...}, ...]}`. The column set is taken from the first object,
//! in the order the keys appear in the response.

use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use crate::models::Table;
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

/// POST `{}` to `url` and return the `Data` objects.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_data<F: Fetch>(fetcher: &F, url: &str) -> Result<Vec<Map<String, Value>>> {
    let response = fetcher.post_json(url, &json!({})).await?;
    let rows = data_rows(response)?;
    info!(rows = rows.len(), "Fetched WHO data");
    Ok(rows)
}

/// Pull the `Data` list out of a response body.
pub fn data_rows(response: Value) -> Result<Vec<Map<String, Value>>> {
    let Value::Object(mut body) = response else {
        return Err(IngestError::MalformedPayload("WHO response is not an object".into()));
    };
    let data = match body.remove("Data") {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Err(IngestError::EmptyDataset("who".into())),
        Some(_) => return Err(IngestError::MalformedPayload("WHO `Data` is not a list".into())),
    };
    let total = data.len();
    let rows: Vec<_> = data
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect();
    if rows.len() < total {
        warn!(dropped = total - rows.len(), "Ignoring non-object entries in WHO data");
    }
    if rows.is_empty() {
        return Err(IngestError::EmptyDataset("who".into()));
    }
    Ok(rows)
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Tabulate the rows using the first row's keys as the header.
pub fn to_table(rows: &[Map<String, Value>]) -> Table {
    let headers: Vec<String> = rows
        .first()
        .map(|first| first.keys().cloned().collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| headers.iter().map(|h| cell(row.get(h))).collect())
        .collect();
    Table { headers, rows }
}
