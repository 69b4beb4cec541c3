//! Error types for the edgequake-docread library.
//!
//! Every failure in the extraction pipeline is a variant of [`ExtractError`].
//! The orchestrator catches each one exactly once, runs artifact cleanup, and
//! hands the error back to the caller, which maps it to a status code with
//! [`ExtractError::status_code`] and a JSON body with
//! [`ExtractError::to_response`].
//!
//! Upstream payloads (rejection bodies, failed-job documents) are carried
//! verbatim so whoever reads the response can see what the remote service
//! actually said.

use crate::output::ErrorResponse;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docread library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No file was uploaded, or it is missing / empty on disk.
    #[error("No file uploaded or file is empty: '{path}'")]
    MissingFile { path: PathBuf },

    /// The artifact is oversized and its type has no compression route.
    #[error("Unsupported media type '{extension}': only PDF and raster images can be compressed")]
    UnsupportedMediaType { extension: String },

    // ── Compression errors ────────────────────────────────────────────────
    /// A compression route exists for the type but the tool is not installed.
    #[error("{capability} is not available; cannot shrink a {size}-byte file below the {threshold}-byte limit")]
    CapabilityUnavailable {
        capability: String,
        size: u64,
        threshold: u64,
    },

    /// The compression tool ran but did not produce a usable artifact.
    #[error("Compression failed: {detail}")]
    CompressionFailed { detail: String },

    /// The artifact (after any compression) exceeds the remote hard ceiling.
    #[error("File is too large: {size} bytes exceeds the {ceiling}-byte limit of the analysis service")]
    PayloadTooLarge { size: u64, ceiling: u64 },

    // ── Remote analysis errors ────────────────────────────────────────────
    /// The analysis service did not accept the submission.
    #[error("Analysis submission failed: {0}")]
    UpstreamSubmitFailed(#[from] SubmitFailure),

    /// The remote job reached the `failed` state. `payload` is the raw body.
    #[error("Analysis operation failed: {payload}")]
    OperationFailed { payload: String },

    /// The job did not reach a terminal state before the poll deadline.
    #[error("Analysis did not complete within {secs}s ({polls} polls)")]
    PollTimeout { secs: u64, polls: u32 },

    /// A non-recoverable transport or HTTP error while polling.
    #[error("Polling the analysis operation failed: {detail}")]
    PollError {
        status: Option<u16>,
        detail: String,
    },

    /// The surrounding request was aborted before completion.
    #[error("Request was cancelled")]
    Cancelled,

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a submission was not accepted by the analysis service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitFailure {
    /// 2xx response without an operation-location header. Nothing to poll.
    #[error("service accepted the request but returned no operation location")]
    NoOperationLocation,

    /// Non-2xx response. `body` is passed through verbatim.
    #[error("service returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(String),
}

impl ExtractError {
    /// HTTP-style status code for this error.
    ///
    /// | Code | Errors |
    /// |------|--------|
    /// | 400 | `MissingFile` |
    /// | 413 | `PayloadTooLarge`, `CapabilityUnavailable` |
    /// | 415 | `UnsupportedMediaType` |
    /// | 499 | `Cancelled` |
    /// | 500 | everything else |
    pub fn status_code(&self) -> u16 {
        match self {
            ExtractError::MissingFile { .. } => 400,
            ExtractError::PayloadTooLarge { .. } | ExtractError::CapabilityUnavailable { .. } => {
                413
            }
            ExtractError::UnsupportedMediaType { .. } => 415,
            ExtractError::Cancelled => 499,
            _ => 500,
        }
    }

    /// The `{ "error": ... }` body for this error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(e: std::io::Error) -> Self {
        ExtractError::Internal(format!("I/O error: {e}"))
    }
}
