//! Error taxonomy for the ingestion pipeline.
//!
//! Every stage (fetch, parse, extract, store) maps its failures onto
//! [`IngestError`] so the orchestration layer can log the failing stage and
//! decide whether sibling work continues. A line that does not match its
//! division's pattern is *not* an error and never shows up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Network failure or undecodable body.
    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("response body from {url} is not valid UTF-8")]
    Decode { url: String },

    /// A local input file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Both HTML parsing strategies gave up.
    #[error("could not parse HTML: {0}")]
    Parse(String),

    #[error("div[id='{0}'] not found")]
    DivisionNotFound(String),

    #[error("no embedded JSON data found in div[id='{0}']")]
    NoEmbeddedData(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON decoded fine but does not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("no records in {0} dataset")]
    EmptyDataset(String),

    #[error("element #{id} not available after {attempts} attempts")]
    ElementNotFound { id: String, attempts: usize },

    #[error("storage operation on {key} failed: {source}")]
    Storage {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Short stage label used in log lines.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Fetch { .. }
            | IngestError::Status { .. }
            | IngestError::Decode { .. }
            | IngestError::Read { .. } => "fetch",
            IngestError::Parse(_) => "parse",
            IngestError::DivisionNotFound(_)
            | IngestError::NoEmbeddedData(_)
            | IngestError::Json(_)
            | IngestError::MalformedPayload(_)
            | IngestError::EmptyDataset(_)
            | IngestError::ElementNotFound { .. } => "extract",
            IngestError::Storage { .. } => "store",
            IngestError::Config(_) => "config",
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_not_found_message() {
        let err = IngestError::DivisionNotFound("overall-by-date-of-notification".into());
        assert_eq!(
            err.to_string(),
            "div[id='overall-by-date-of-notification'] not found"
        );
        assert_eq!(err.stage(), "extract");
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(IngestError::Parse("empty".into()).stage(), "parse");
        assert_eq!(IngestError::Config("bucket".into()).stage(), "config");
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = IngestError::Storage {
            key: "ecdc/latest.csv".into(),
            source: io,
        };
        assert_eq!(err.stage(), "store");
        assert!(err.to_string().contains("ecdc/latest.csv"));
    }
}
