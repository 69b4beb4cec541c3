//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to observe a
//! request as it moves through compression, submission and polling. The
//! `docread` binary uses it to drive a terminal spinner; a server could
//! forward the same events to a job-status table.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docread::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicU32, Ordering}};
//!
//! struct PollCounter(AtomicU32);
//!
//! impl ExtractionProgressCallback for PollCounter {
//!     fn on_poll(&self, poll: u32, status: &str) {
//!         self.0.store(poll, Ordering::SeqCst);
//!         eprintln!("poll #{poll}: {status}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(PollCounter(AtomicU32::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the extractor as a request advances.
///
/// All methods default to no-ops so implementors only override what they
/// need. Implementations must be `Send + Sync`: requests run concurrently.
pub trait ExtractionProgressCallback: Send + Sync {
    /// An oversized artifact is about to be compressed.
    ///
    /// # Arguments
    /// * `kind` — `"pdf"` or `"image"`
    /// * `size` — size in bytes before compression
    fn on_compression_start(&self, kind: &str, size: u64) {
        let _ = (kind, size);
    }

    /// Compression finished.
    fn on_compressed(&self, before: u64, after: u64) {
        let _ = (before, after);
    }

    /// The artifact was accepted and a job handle returned.
    fn on_submitted(&self, operation: &str) {
        let _ = operation;
    }

    /// A status poll returned (1-indexed poll count, raw job status).
    fn on_poll(&self, poll: u32, status: &str) {
        let _ = (poll, status);
    }

    /// The poll loop is waiting before retrying after a 429 or 5xx.
    fn on_backoff(&self, http_status: u16, delay: Duration) {
        let _ = (http_status, delay);
    }

    /// The request produced `page_count` pages.
    fn on_complete(&self, page_count: usize) {
        let _ = page_count;
    }
}

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
