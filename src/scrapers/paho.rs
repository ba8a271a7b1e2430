//! PAHO dashboard scraper.
//!
//! The dashboard exposes its CSV exports through download anchors
//! (`<a id="data1" href="...">`). The `href` is filled in after the page's
//! server session starts, so the link is polled with backoff until it shows
//! up, then the file behind it is downloaded verbatim.

use crate::error::{IngestError, Result};
use crate::fetch::{Fetch, Poller};
use crate::scrapers::html::{find_by_id, parse_quietly};
use tracing::{info, instrument};
use url::Url;

/// Download anchor id and the artifact name it is stored under.
pub const DOWNLOADS: [(&str, &str); 2] = [("data1", "mpx_data"), ("data2", "mpx_linelist")];

/// Absolute `href` of the element with `id`, if present and non-empty.
pub fn find_href(page: &str, page_url: &Url, id: &str) -> Result<Option<String>> {
    let (doc, _) = parse_quietly(page)?;
    let Some(el) = find_by_id(&doc, id) else {
        return Ok(None);
    };
    let href = match el.value().attr("href").map(str::trim) {
        Some(h) if !h.is_empty() && h != "#" => h,
        _ => return Ok(None),
    };
    let resolved = page_url
        .join(href)
        .map_err(|e| IngestError::MalformedPayload(format!("bad href {href:?} on #{id}: {e}")))?;
    Ok(Some(resolved.to_string()))
}

/// Poll `page_url` until the anchor `id` carries a link.
#[instrument(level = "info", skip(fetcher, poller))]
pub async fn discover_link<F: Fetch>(
    fetcher: &F,
    poller: &Poller,
    page_url: &str,
    id: &str,
) -> Result<String> {
    let base = Url::parse(page_url)
        .map_err(|e| IngestError::Config(format!("invalid paho_endpoint {page_url}: {e}")))?;
    let link = poller
        .poll(id, || {
            let base = &base;
            async move {
                let page = fetcher.get_text(page_url).await?;
                find_href(&page, base, id)
            }
        })
        .await?;
    info!(%link, "Found PAHO download link");
    Ok(link)
}
