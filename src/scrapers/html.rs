//! HTML parsing with a strict strategy and a lenient fallback.
//!
//! The strict pass parses the input as a whole document and rejects it if
//! the tokenizer reported any error. The lenient pass parses it as a
//! fragment and only gives up when there is no element at all to work
//! with. Both failing is fatal for the page.

use crate::error::{IngestError, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Strict,
    Lenient,
}

/// Parse with the strict strategy, falling back to the lenient one once.
#[instrument(level = "info", skip_all, fields(bytes = content.len()))]
pub fn make_document(content: &str) -> Result<Html> {
    match parse_with(content, Strategy::Strict) {
        Ok(doc) => Ok(doc),
        Err(strict_err) => {
            warn!(error = %strict_err, "Strict HTML parse failed; retrying leniently");
            parse_with(content, Strategy::Lenient).map_err(|e| {
                error!(error = %e, "Lenient HTML parse failed");
                e
            })
        }
    }
}

/// Same fallback as [`make_document`] for callers that parse the same page
/// repeatedly, such as a poll loop. A strict failure is only logged at debug.
/// Returns the strategy that produced the tree.
pub fn parse_quietly(content: &str) -> Result<(Html, Strategy)> {
    match parse_with(content, Strategy::Strict) {
        Ok(doc) => Ok((doc, Strategy::Strict)),
        Err(strict_err) => {
            debug!(error = %strict_err, "Strict HTML parse failed; retrying leniently");
            parse_with(content, Strategy::Lenient).map(|doc| (doc, Strategy::Lenient))
        }
    }
}

pub fn parse_with(content: &str, strategy: Strategy) -> Result<Html> {
    match strategy {
        Strategy::Strict => {
            let doc = Html::parse_document(content);
            if doc.errors.is_empty() {
                debug!("Strict parse succeeded");
                Ok(doc)
            } else {
                Err(IngestError::Parse(format!(
                    "{} parse error(s), first: {}",
                    doc.errors.len(),
                    doc.errors[0]
                )))
            }
        }
        Strategy::Lenient => {
            let doc = Html::parse_fragment(content);
            if has_content_element(&doc) {
                debug!(errors = doc.errors.len(), "Lenient parse succeeded");
                Ok(doc)
            } else {
                Err(IngestError::Parse("no elements found in input".to_string()))
            }
        }
    }
}

/// True when the tree holds at least one element beyond the wrappers the
/// parser inserts on its own.
fn has_content_element(doc: &Html) -> bool {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .any(|el| !matches!(el.value().name(), "html" | "head" | "body"))
}

/// Find the element whose `id` attribute equals `id`.
pub fn find_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// First `<script>` element inside `scope`.
pub fn first_script<'a>(scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let selector = Selector::parse("script").ok()?;
    scope.select(&selector).next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_accepts_clean_document() {
        let html = "<!DOCTYPE html><html><head><title>t</title></head><body><div id=\"a\">x</div></body></html>";
        let doc = parse_with(html, Strategy::Strict).unwrap();
        assert!(find_by_id(&doc, "a").is_some());
    }

    #[test]
    fn test_strict_rejects_document_with_errors() {
        // Missing doctype is reported as a parse error.
        let html = "<div id=\"a\">x</div>";
        assert!(parse_with(html, Strategy::Strict).is_err());
    }

    #[test]
    fn test_fallback_to_lenient() {
        let html = "<div id=\"a\"><script>{}</script></div>";
        let doc = make_document(html).unwrap();
        let div = find_by_id(&doc, "a").unwrap();
        assert!(first_script(div).is_some());
    }

    #[test]
    fn test_parse_quietly_reports_strategy() {
        let clean = "<!DOCTYPE html><html><head></head><body><a id=\"d\"></a></body></html>";
        let (_, used) = parse_quietly(clean).unwrap();
        assert_eq!(used, Strategy::Strict);

        let (doc, used) = parse_quietly("<a id=\"d\" href=\"x.csv\">x</a>").unwrap();
        assert_eq!(used, Strategy::Lenient);
        assert!(find_by_id(&doc, "d").is_some());

        assert!(parse_quietly("").is_err());
    }

    #[test]
    fn test_both_strategies_fail_on_blank_input() {
        let err = make_document("   \n  ").unwrap_err();
        assert!(matches!(err, IngestError::Parse(_)));
        assert!(make_document("just some text").is_err());
    }

    #[test]
    fn test_find_by_id_missing() {
        let doc = make_document("<p id=\"x\">hello</p>").unwrap();
        assert!(find_by_id(&doc, "y").is_none());
    }
}
