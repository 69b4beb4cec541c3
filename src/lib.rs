//! # edgequake-docread
//!
//! Extract per-page, per-sentence text from uploaded documents and images
//! using a remote document-layout analysis service.
//!
//! The crate is a narrow adapter between "raw uploaded bytes" and
//! "normalized extracted text". It shrinks files that are too big for the
//! service, submits them, polls the asynchronous job, and flattens whatever
//! result shape the service returns into a stable structure.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate  file exists and is non-empty
//!  ├─ 2. Compress  over the soft threshold: Ghostscript (PDF) or JPEG re-encode (image)
//!  ├─ 3. Ceiling   still over the service's hard limit → 413
//!  ├─ 4. Submit    POST bytes, require an Operation-Location handle
//!  ├─ 5. Poll      until succeeded / failed / deadline, backing off on 429 and 5xx
//!  ├─ 6. Normalize pages from any known result shape, then split sentences
//!  └─ 7. Output    { filename, pageCount, pages[] }; all temp files removed
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docread::{ExtractionConfig, Extractor, UploadedArtifact};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .endpoint("https://my-resource.cognitiveservices.azure.com")
//!         .api_key(std::env::var("DOCREAD_API_KEY")?)
//!         .build()?;
//!     // Checks for Ghostscript once; share the extractor across requests.
//!     let extractor = Extractor::connect(config).await?;
//!
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let upload = UploadedArtifact::stage_bytes(&bytes, "scan.pdf", None, &std::env::temp_dir())?;
//!     match extractor.extract(upload).await {
//!         Ok(out) => println!("{}", serde_json::to_string(&out)?),
//!         Err(e) => eprintln!("{} {}", e.status_code(), serde_json::to_string(&e.to_response())?),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docread` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Capabilities, ExtractionConfig, ExtractionConfigBuilder, PdfPreset};
pub use error::{ExtractError, SubmitFailure};
pub use extract::Extractor;
pub use output::{ErrorResponse, ExtractionOutput, NormalizedPage};
pub use pipeline::analysis::{AnalysisClient, Clock, OperationHandle, PollPolicy, TokioClock};
pub use pipeline::ghostscript::{Ghostscript, PdfCompressor};
pub use pipeline::input::{MediaKind, RasterFormat, UploadedArtifact};
pub use pipeline::segment::split_sentences;
pub use pipeline::transport::{AnalysisTransport, HttpTransport, PollReply, SubmitReply, TransportError};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
