//! Image compression: decode, cap the longest side, re-encode as JPEG.
//!
//! This stage trades fidelity for size: a 2000 px JPEG at quality 60 still
//! reads well. Aspect ratio is preserved and images already within the cap
//! are never upscaled.
//!
//! Decoding and encoding are CPU-bound, so the work runs inside
//! `spawn_blocking` to keep Tokio worker threads free. A blocking task cannot
//! be stopped once started, so it holds its own reference to the output
//! [`ArtifactGuard`]: if the request is dropped mid-encode, the file is
//! removed when the task finishes rather than when the request unwinds.

use crate::error::ExtractError;
use crate::pipeline::input::ArtifactGuard;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Re-encode the image at `input` into a JPEG at `output`'s path.
pub async fn compress_image(
    input: &Path,
    output: Arc<ArtifactGuard>,
    max_dimension: u32,
    quality: u8,
) -> Result<(), ExtractError> {
    let input = input.to_path_buf();

    tokio::task::spawn_blocking(move || {
        compress_image_blocking(&input, output.path(), max_dimension, quality)
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Image compression task panicked: {e}")))?
}

fn compress_image_blocking(
    input: &Path,
    output: &Path,
    max_dimension: u32,
    quality: u8,
) -> Result<(), ExtractError> {
    let img = ImageReader::open(input)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| failed(format!("cannot open image {}: {e}", input.display())))?
        .decode()
        .map_err(|e| failed(format!("cannot decode image {}: {e}", input.display())))?;

    let (width, height) = img.dimensions();
    let img = fit_within(img, max_dimension);
    debug!(
        "Image {}x{} → {}x{} (quality {})",
        width,
        height,
        img.width(),
        img.height(),
        quality
    );

    // JPEG has no alpha channel.
    let rgb = img.to_rgb8();
    let file = File::create(output)
        .map_err(|e| failed(format!("cannot create {}: {e}", output.display())))?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality)
        .encode_image(&rgb)
        .map_err(|e| failed(format!("JPEG encoding failed: {e}")))?;
    writer
        .flush()
        .map_err(|e| failed(format!("cannot write {}: {e}", output.display())))?;
    Ok(())
}

/// Scale down so the longest side is at most `max_dimension`.
pub fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w.max(h) <= max_dimension {
        return img;
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

fn failed(detail: String) -> ExtractError {
    ExtractError::CompressionFailed { detail }
}
