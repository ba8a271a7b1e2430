//! Data models shared across the pipeline.
//!
//! - [`Division`]: the three ECDC page sections, each carrying its own line
//!   pattern and column order
//! - [`Record`]: one observation extracted from a division
//! - [`Agency`]: the upstream sources the `ingest` command can target
//! - [`Table`]: header + rows for sources that already publish tabular data

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single cell value. Counts are integers, everything else is text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Count(i64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Count(n) => write!(f, "{n}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Count(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Count(n.into())
    }
}

/// One structured observation: date, count, and optionally a country or an
/// onset type depending on the division it came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Field names present on this record, sorted.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

static ONSET_BY_COUNTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Date: (20\d\d-[0-1]\d-\d\d)<br />count:\s+(\d+)<br />ReportingCountry:\s+(.*)")
        .expect("valid onset-by-country pattern")
});
static NOTIFICATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^DateNotif: (20\d\d-[0-1]\d-\d\d)<br />count:\s+(\d+)")
        .expect("valid notification pattern")
});
static ONSET_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Date: (20\d\d-[0-1]\d-\d\d)<br />count:\s+(\d+)<br />TypeDate: (\w+)")
        .expect("valid onset-date pattern")
});

/// A named section of the ECDC report page.
///
/// Each variant knows the `id` attribute of its `<div>`, the pattern its
/// embedded text lines follow, and the column order of its CSV output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Division {
    /// Cases by date of onset, broken down by reporting country.
    OnsetByCountry,
    /// Overall cases by date of notification.
    Notification,
    /// Overall cases by date of symptom onset, tagged with the date type.
    OnsetDate,
}

impl Division {
    pub const ALL: [Division; 3] = [
        Division::OnsetByCountry,
        Division::Notification,
        Division::OnsetDate,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Division::OnsetByCountry => "by-date-of-onset-and-by-country-or-area",
            Division::Notification => "overall-by-date-of-notification",
            Division::OnsetDate => "overall-by-date-of-symptom-onset",
        }
    }

    /// Column order of this division's CSV output.
    pub fn fields(self) -> &'static [&'static str] {
        match self {
            Division::OnsetByCountry => &["date", "country", "count"],
            Division::Notification => &["date", "count"],
            Division::OnsetDate => &["date", "count", "type"],
        }
    }

    pub fn pattern(self) -> &'static Regex {
        match self {
            Division::OnsetByCountry => &ONSET_BY_COUNTRY_RE,
            Division::Notification => &NOTIFICATION_RE,
            Division::OnsetDate => &ONSET_DATE_RE,
        }
    }

    /// Parse one embedded text line.
    ///
    /// Returns `None` when the line does not match the division's pattern,
    /// or when the count does not fit in an `i64`. Callers skip such lines.
    pub fn parse_line(self, line: &str) -> Option<Record> {
        let caps = self.pattern().captures(line)?;
        let date = caps.get(1)?.as_str();
        let count: i64 = caps.get(2)?.as_str().parse().ok()?;
        let record = Record::new().with("date", date).with("count", count);
        Some(match self {
            Division::OnsetByCountry => record.with("country", caps.get(3)?.as_str()),
            Division::Notification => record,
            Division::OnsetDate => record.with("type", caps.get(3)?.as_str()),
        })
    }
}

impl fmt::Display for Division {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Upstream data sources handled by the `ingest` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Agency {
    Cdc,
    Ecdc,
    Paho,
    Who,
}

impl Agency {
    /// Processing order when several agencies are requested.
    pub const ALL: [Agency; 4] = [Agency::Cdc, Agency::Ecdc, Agency::Paho, Agency::Who];

    pub fn slug(self) -> &'static str {
        match self {
            Agency::Cdc => "cdc",
            Agency::Ecdc => "ecdc",
            Agency::Paho => "paho",
            Agency::Who => "who",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Agency::Cdc => "CDC",
            Agency::Ecdc => "ECDC",
            Agency::Paho => "PAHO",
            Agency::Who => "WHO",
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Tabular data as published upstream (CDC CSV, WHO `Data` list).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line_onset_by_country() {
        let rec = Division::OnsetByCountry
            .parse_line("Date: 2022-07-01<br />count:   12<br />ReportingCountry: Spain")
            .unwrap();
        assert_eq!(rec.get("date"), Some(&FieldValue::Text("2022-07-01".into())));
        assert_eq!(rec.get("count"), Some(&FieldValue::Count(12)));
        assert_eq!(rec.get("country"), Some(&FieldValue::Text("Spain".into())));
        assert_eq!(rec.field_names().count(), 3);
    }

    #[test]
    fn test_parse_line_notification() {
        let rec = Division::Notification
            .parse_line("DateNotif: 2022-06-15<br />count: 7")
            .unwrap();
        assert_eq!(rec.field_names().collect::<Vec<_>>(), vec!["count", "date"]);
        assert_eq!(rec.get("count"), Some(&FieldValue::Count(7)));
    }

    #[test]
    fn test_parse_line_onset_date() {
        let rec = Division::OnsetDate
            .parse_line("Date: 2022-05-20<br />count: 3<br />TypeDate: Onset")
            .unwrap();
        assert_eq!(rec.get("type"), Some(&FieldValue::Text("Onset".into())));
    }

    #[test]
    fn test_parse_line_anchored_at_start() {
        assert!(Division::Notification
            .parse_line("prefix DateNotif: 2022-06-15<br />count: 7")
            .is_none());
    }

    #[test]
    fn test_parse_line_rejects_other_division_shape() {
        let line = "DateNotif: 2022-06-15<br />count: 7";
        assert!(Division::OnsetByCountry.parse_line(line).is_none());
        assert!(Division::OnsetDate.parse_line(line).is_none());
    }

    #[test]
    fn test_parse_line_count_overflow_is_skipped() {
        let line = "DateNotif: 2022-06-15<br />count: 99999999999999999999999";
        assert!(Division::Notification.parse_line(line).is_none());
    }

    #[test]
    fn test_division_fields_and_ids() {
        for div in Division::ALL {
            assert!(div.fields().contains(&"date"));
            assert!(div.fields().contains(&"count"));
            assert!(!div.id().is_empty());
        }
        assert_eq!(Division::OnsetByCountry.fields(), &["date", "country", "count"]);
    }

    #[test]
    fn test_record_serializes_counts_as_numbers() {
        let rec = Record::new().with("date", "2022-07-01").with("count", 4);
        let json = serde_json::to_string(&rec).unwrap();
        assert_eq!(json, r#"{"count":4,"date":"2022-07-01"}"#);
    }

    #[test]
    fn test_agency_order_and_slugs() {
        let slugs: Vec<_> = Agency::ALL.iter().map(|a| a.slug()).collect();
        assert_eq!(slugs, vec!["cdc", "ecdc", "paho", "who"]);
        assert_eq!(Agency::Who.display_name(), "WHO");
    }
}
