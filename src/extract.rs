//! Request orchestration: upload → compress → submit → poll → normalize.
//!
//! [`Extractor`] is built once at startup and shared across requests; it
//! holds only read-only configuration and stateless collaborators, so
//! concurrent requests never contend. Each call to [`Extractor::extract`]
//! owns its artifacts exclusively and deletes them before returning,
//! whatever the outcome.

use crate::config::{Capabilities, ExtractionConfig};
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, NormalizedPage};
use crate::pipeline::analysis::{AnalysisClient, Clock, PollPolicy, TokioClock};
use crate::pipeline::compress::{self, CompressionPlan};
use crate::pipeline::ghostscript::{Ghostscript, PdfCompressor};
use crate::pipeline::input::{self, ArtifactGuard, MediaKind, UploadedArtifact};
use crate::pipeline::normalize::normalize;
use crate::pipeline::segment::split_sentences;
use crate::pipeline::transport::{AnalysisTransport, HttpTransport};
use futures::future::{AbortRegistration, Abortable};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The extraction pipeline.
#[derive(Clone)]
pub struct Extractor {
    config: Arc<ExtractionConfig>,
    capabilities: Capabilities,
    client: AnalysisClient,
    pdf: Arc<dyn PdfCompressor>,
}

impl Extractor {
    /// Wire the production collaborators: HTTPS transport, Tokio clock and
    /// Ghostscript, probing tool availability once.
    pub async fn connect(config: ExtractionConfig) -> Result<Self, ExtractError> {
        let capabilities = Capabilities::detect(&config).await;
        let transport = Arc::new(HttpTransport::from_config(&config)?);
        let pdf = Arc::new(Ghostscript::from_config(&config));
        Ok(Self::with_parts(
            config,
            capabilities,
            transport,
            Arc::new(TokioClock),
            pdf,
        ))
    }

    /// Assemble an extractor from explicit collaborators.
    pub fn with_parts(
        config: ExtractionConfig,
        capabilities: Capabilities,
        transport: Arc<dyn AnalysisTransport>,
        clock: Arc<dyn Clock>,
        pdf: Arc<dyn PdfCompressor>,
    ) -> Self {
        let client = AnalysisClient::new(transport, clock, PollPolicy::from_config(&config))
            .with_progress(config.progress_callback.clone());
        Self {
            config: Arc::new(config),
            capabilities,
            client,
            pdf,
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Run one upload through the pipeline.
    ///
    /// The uploaded file, and any compressed copy, are deleted before this
    /// returns, on success and on every error. Deletion failures are logged
    /// and never replace the primary result.
    ///
    /// # Errors
    /// - `MissingFile` — nothing on disk, or an empty file
    /// - `UnsupportedMediaType` / `CapabilityUnavailable` / `CompressionFailed`
    ///   — the file is over the soft threshold and could not be shrunk
    /// - `PayloadTooLarge` — still over the hard ceiling
    /// - `UpstreamSubmitFailed` — the service did not hand back a job
    /// - `OperationFailed` / `PollTimeout` / `PollError` — the job did not succeed
    pub async fn extract(&self, upload: UploadedArtifact) -> Result<ExtractionOutput, ExtractError> {
        let _upload = ArtifactGuard::new(&upload.path);
        let start = Instant::now();
        info!("Starting extraction: {}", upload.filename);

        let result = self.run(&upload).await;
        match &result {
            Ok(out) => info!(
                "Extraction complete: '{}', {} pages, {}ms",
                out.filename,
                out.page_count,
                start.elapsed().as_millis()
            ),
            Err(e) => warn!(
                "Extraction failed for '{}' (status {}): {}",
                upload.filename,
                e.status_code(),
                e
            ),
        }
        result
    }

    /// [`Self::extract`], stopping early when `registration`'s handle is aborted.
    ///
    /// Aborting drops the in-flight work: the poll timer is released, a
    /// running compression process is killed, and the artifacts are still
    /// deleted.
    pub async fn extract_with_abort(
        &self,
        upload: UploadedArtifact,
        registration: AbortRegistration,
    ) -> Result<ExtractionOutput, ExtractError> {
        let filename = upload.filename.clone();
        match Abortable::new(self.extract(upload), registration).await {
            Ok(result) => result,
            Err(_aborted) => {
                info!("Extraction of '{}' cancelled", filename);
                Err(ExtractError::Cancelled)
            }
        }
    }

    async fn run(&self, upload: &UploadedArtifact) -> Result<ExtractionOutput, ExtractError> {
        let config = &*self.config;
        let progress = config.progress_callback.as_ref();

        // ── Step 1: Validate ─────────────────────────────────────────────────
        let size = input::validate(&upload.path).await?;
        let kind = upload.media_kind();
        debug!("Upload {} is {} bytes ({:?})", upload.path.display(), size, kind);

        // ── Step 2: Compress if over the soft threshold ──────────────────────
        let plan = compress::select(size, config.soft_threshold_bytes, &kind, &self.capabilities)?;
        if plan != CompressionPlan::Passthrough {
            if let Some(cb) = progress {
                let label = if plan == CompressionPlan::Pdf { "pdf" } else { "image" };
                cb.on_compression_start(label, size);
            }
        }
        let compressed = compress::apply(plan, &upload.path, config, self.pdf.as_ref()).await?;

        let (path, content_type) = match &compressed {
            Some(c) => (c.guard.path(), c.content_type.to_string()),
            None => (upload.path.as_path(), submission_content_type(upload, &kind)),
        };

        // ── Step 3: Enforce the hard ceiling ─────────────────────────────────
        let final_size = input::measure(path).await?;
        if compressed.is_some() {
            info!("Compressed {} → {} bytes", size, final_size);
            if let Some(cb) = progress {
                cb.on_compressed(size, final_size);
            }
        }
        if final_size > config.hard_ceiling_bytes {
            return Err(ExtractError::PayloadTooLarge {
                size: final_size,
                ceiling: config.hard_ceiling_bytes,
            });
        }

        // ── Step 4: Submit ───────────────────────────────────────────────────
        let handle = self.client.submit(path, &content_type).await?;

        // ── Step 5: Poll ─────────────────────────────────────────────────────
        let document = self.client.poll(&handle).await?;

        // ── Step 6: Normalize and segment ────────────────────────────────────
        let pages: Vec<NormalizedPage> = normalize(&document)
            .into_iter()
            .map(|raw| NormalizedPage {
                page_number: raw.page_number,
                sentences: split_sentences(&raw.text),
                raw_text: raw.text,
            })
            .collect();

        if let Some(cb) = progress {
            cb.on_complete(pages.len());
        }

        // ── Step 7: Assemble ─────────────────────────────────────────────────
        Ok(ExtractionOutput {
            filename: upload.filename.clone(),
            page_count: pages.len(),
            pages,
        })
    }
}

/// Content type for an uncompressed upload: declared, else by extension.
fn submission_content_type(upload: &UploadedArtifact, kind: &MediaKind) -> String {
    upload
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .map(str::to_string)
        .or_else(|| kind.mime_type().map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::input::RasterFormat;

    #[test]
    fn content_type_prefers_declared() {
        let upload = UploadedArtifact::new("/tmp/a.png", "a.png", Some("image/x-custom".into()));
        assert_eq!(
            submission_content_type(&upload, &MediaKind::Image(RasterFormat::Png)),
            "image/x-custom"
        );
    }

    #[test]
    fn content_type_falls_back_to_extension_then_octets() {
        let upload = UploadedArtifact::new("/tmp/a.pdf", "a.pdf", Some("  ".into()));
        assert_eq!(
            submission_content_type(&upload, &MediaKind::Pdf),
            "application/pdf"
        );
        let upload = UploadedArtifact::new("/tmp/a.xyz", "a.xyz", None);
        assert_eq!(
            submission_content_type(&upload, &MediaKind::Other("xyz".into())),
            "application/octet-stream"
        );
    }
}
