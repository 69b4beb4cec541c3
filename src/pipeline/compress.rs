//! Compression selection: decide whether and how to shrink an artifact.
//!
//! [`select`] is a pure decision over size, threshold, media kind and the
//! startup [`Capabilities`]. [`apply`] carries a plan out by calling the PDF
//! or image adapter and returns the new artifact wrapped in an
//! [`ArtifactGuard`], so the compressed file is cleaned up with the request
//! (or, for an image still encoding when the request is dropped, with the
//! encoding task).
//!
//! | Condition | Plan |
//! |-----------|------|
//! | size ≤ threshold | [`CompressionPlan::Passthrough`] |
//! | `.pdf`, Ghostscript present | [`CompressionPlan::Pdf`] |
//! | `.pdf`, no Ghostscript | `CapabilityUnavailable` |
//! | supported raster image | [`CompressionPlan::Image`] |
//! | anything else | `UnsupportedMediaType` |

use crate::config::{Capabilities, ExtractionConfig};
use crate::error::ExtractError;
use crate::pipeline::ghostscript::PdfCompressor;
use crate::pipeline::input::{ArtifactGuard, MediaKind, RasterFormat};
use crate::pipeline::raster;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// What to do with an artifact before submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionPlan {
    /// Submit as-is.
    Passthrough,
    /// Rewrite through the PDF compressor.
    Pdf,
    /// Resize and re-encode as JPEG.
    Image(RasterFormat),
}

/// Pick a plan for an artifact of `size` bytes.
pub fn select(
    size: u64,
    threshold: u64,
    kind: &MediaKind,
    capabilities: &Capabilities,
) -> Result<CompressionPlan, ExtractError> {
    if size <= threshold {
        return Ok(CompressionPlan::Passthrough);
    }
    match kind {
        MediaKind::Pdf if capabilities.pdf_compression => Ok(CompressionPlan::Pdf),
        MediaKind::Pdf => Err(ExtractError::CapabilityUnavailable {
            capability: "PDF compression (Ghostscript)".to_string(),
            size,
            threshold,
        }),
        MediaKind::Image(format) => Ok(CompressionPlan::Image(*format)),
        MediaKind::Other(ext) => Err(ExtractError::UnsupportedMediaType {
            extension: if ext.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{ext}")
            },
        }),
    }
}

/// A freshly written replacement artifact.
#[derive(Debug)]
pub struct CompressedArtifact {
    /// Shared with the image encoder while it runs.
    pub guard: Arc<ArtifactGuard>,
    pub content_type: &'static str,
}

/// Execute `plan` against `source`. `Passthrough` returns `None`.
pub async fn apply(
    plan: CompressionPlan,
    source: &Path,
    config: &ExtractionConfig,
    pdf: &dyn PdfCompressor,
) -> Result<Option<CompressedArtifact>, ExtractError> {
    let work_dir = config.work_dir();
    let compressed = match plan {
        CompressionPlan::Passthrough => return Ok(None),
        CompressionPlan::Pdf => {
            let guard = Arc::new(reserve(&work_dir, ".pdf")?);
            pdf.compress(source, guard.path()).await?;
            CompressedArtifact {
                guard,
                content_type: "application/pdf",
            }
        }
        CompressionPlan::Image(format) => {
            info!("Compressing {:?} image {}", format, source.display());
            let guard = Arc::new(reserve(&work_dir, ".jpg")?);
            raster::compress_image(
                source,
                guard.clone(),
                config.max_image_dimension,
                config.image_quality,
            )
            .await?;
            CompressedArtifact {
                guard,
                content_type: "image/jpeg",
            }
        }
    };
    Ok(Some(compressed))
}

/// Create a uniquely named empty file in `dir` and guard it.
fn reserve(dir: &Path, suffix: &str) -> Result<ArtifactGuard, ExtractError> {
    let tmp = tempfile::Builder::new()
        .prefix("compressed-")
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    let (_, path) = tmp
        .keep()
        .map_err(|e| ExtractError::Internal(format!("tempfile keep: {e}")))?;
    Ok(ArtifactGuard::new(path))
}
