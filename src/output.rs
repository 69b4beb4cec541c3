//! Output types returned by a successful extraction, plus the error body.
//!
//! Field names serialise in camelCase so the JSON matches what upload
//! clients already consume:
//!
//! ```json
//! { "filename": "a.pdf", "pageCount": 1,
//!   "pages": [ { "pageNumber": 1, "rawText": "...", "sentences": ["..."] } ] }
//! ```

use serde::{Deserialize, Serialize};

/// The normalized result of one extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionOutput {
    /// Declared filename of the upload.
    pub filename: String,
    /// Number of page entries reported by the analysis service.
    pub page_count: usize,
    /// Pages in the order the service returned them.
    pub pages: Vec<NormalizedPage>,
}

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPage {
    /// Page number as reported upstream; `None` when it was missing or ambiguous.
    pub page_number: Option<u32>,
    pub raw_text: String,
    pub sentences: Vec<String>,
}

/// Failure body: `{ "error": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
