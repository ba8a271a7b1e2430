//! CDC case-count scraper.
//!
//! The CDC endpoint already serves CSV. It is parsed into a [`Table`] so the
//! stored artifact gets consistent quoting and line endings, with the
//! source's own header row kept as-is.

use crate::error::{IngestError, Result};
use crate::fetch::Fetch;
use crate::models::Table;
use crate::outputs::csv::parse_table;
use tracing::{error, info, instrument};

#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_table<F: Fetch>(fetcher: &F, url: &str) -> Result<Table> {
    let body = fetcher.get_text(url).await?;
    let table = parse_table(&body);
    if table.headers.is_empty() || table.is_empty() {
        error!(%url, "CDC response contained no rows");
        return Err(IngestError::EmptyDataset("cdc".to_string()));
    }
    info!(rows = table.rows.len(), columns = table.headers.len(), "Parsed CDC CSV");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::testing::StubFetcher;

    #[tokio::test]
    async fn test_fetch_table() {
        let fetcher = StubFetcher::default().with_text(
            "https://cdc.example/data.csv",
            "Location,Cases,Asof\r\nCalifornia,\"1,024\",Jul 1 2022\r\nTexas,500,Jul 1 2022\r\n",
        );
        let table = fetch_table(&fetcher, "https://cdc.example/data.csv").await.unwrap();
        assert_eq!(table.headers, vec!["Location", "Cases", "Asof"]);
        assert_eq!(table.rows[0], vec!["California", "1,024", "Jul 1 2022"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_header_only_is_empty_dataset() {
        let fetcher = StubFetcher::default().with_text("https://cdc.example/data.csv", "Location,Cases\n");
        let err = fetch_table(&fetcher, "https://cdc.example/data.csv").await.unwrap_err();
        assert!(matches!(err, IngestError::EmptyDataset(_)));
    }
}
