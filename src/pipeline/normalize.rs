//! Result normalization: analysis-result JSON → ordered `(page number, text)`.
//!
//! The remote service has shipped several result shapes over its versions:
//!
//! | Shape | Page list key | Page number | Page text |
//! |-------|---------------|-------------|-----------|
//! | Layout (v3+) | `pages` | `pageNumber` | `lines[].content` |
//! | Read (legacy) | `readResults` | `page` | `lines[].text` |
//! | Form (v2) | `pageResults` | `page` | `lines[].text` if present |
//!
//! Each shape is a [`ShapeMatcher`]: a pure function that either recognises
//! the document and returns its pages, or returns `None`. Matchers are tried
//! in [`MATCHERS`] order; the first hit wins. When nothing matches the result
//! is an empty page list, never an error, because the schema belongs to
//! the remote service.

use serde_json::Value;
use tracing::{debug, warn};

/// A page as reported upstream, before sentence segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub page_number: Option<u32>,
    pub text: String,
}

/// Recognises one result shape.
pub type ShapeMatcher = fn(&Value) -> Option<Vec<RawPage>>;

/// Priority order of known shapes.
pub const MATCHERS: &[(&str, ShapeMatcher)] = &[
    ("pages", match_pages),
    ("readResults", match_read_results),
    ("pageResults", match_page_results),
];

const NUMBER_KEYS: &[&str] = &["pageNumber", "page", "page_number"];
const TEXT_KEYS: &[&str] = &["content", "text"];
const FRAGMENT_KEYS: &[&str] = &["lines", "words"];

/// Extract pages from an analysis result.
///
/// `document` may be the full poll response (with an `analyzeResult`
/// envelope) or the bare result object.
pub fn normalize(document: &Value) -> Vec<RawPage> {
    let candidates = [document.get("analyzeResult"), Some(document)];
    for candidate in candidates.into_iter().flatten() {
        for (name, matcher) in MATCHERS {
            if let Some(pages) = matcher(candidate) {
                debug!("Result matched '{}' shape: {} pages", name, pages.len());
                return pages;
            }
        }
    }
    warn!("Analysis result matched no known shape; returning no pages");
    Vec::new()
}

fn match_pages(doc: &Value) -> Option<Vec<RawPage>> {
    page_list(doc, "pages")
}

fn match_read_results(doc: &Value) -> Option<Vec<RawPage>> {
    page_list(doc, "readResults")
}

fn match_page_results(doc: &Value) -> Option<Vec<RawPage>> {
    page_list(doc, "pageResults")
}

fn page_list(doc: &Value, key: &str) -> Option<Vec<RawPage>> {
    let entries = doc.get(key)?.as_array()?;
    Some(entries.iter().map(raw_page).collect())
}

fn raw_page(entry: &Value) -> RawPage {
    RawPage {
        page_number: page_number(entry),
        text: page_text(entry),
    }
}

/// First aliased numbering field that holds a non-negative integer.
fn page_number(entry: &Value) -> Option<u32> {
    NUMBER_KEYS
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_u64))
        .and_then(|n| u32::try_from(n).ok())
}

/// First aliased text field, else line fragments joined by single spaces, else "".
fn page_text(entry: &Value) -> String {
    if let Some(text) = TEXT_KEYS
        .iter()
        .find_map(|k| entry.get(*k).and_then(Value::as_str))
    {
        return text.to_string();
    }

    for key in FRAGMENT_KEYS {
        if let Some(fragments) = entry.get(*key).and_then(Value::as_array) {
            return fragments
                .iter()
                .filter_map(|f| TEXT_KEYS.iter().find_map(|k| f.get(*k).and_then(Value::as_str)))
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    String::new()
}
