//! Input handling: the uploaded artifact, its media kind, and its lifetime.
//!
//! The pipeline owns the uploaded file for the whole request and must delete
//! it on every exit path. Rather than sprinkling `remove_file` calls over each
//! error branch, the orchestrator wraps the path in an [`ArtifactGuard`]
//! whose `Drop` removes the file. Early returns, `?`, panics and a dropped
//! (cancelled) future all take the same route.

use crate::error::ExtractError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A user upload written to disk by the caller.
#[derive(Debug, Clone)]
pub struct UploadedArtifact {
    /// Location on disk. Deleted by the extractor when the request completes.
    pub path: PathBuf,
    /// Filename declared by the client.
    pub filename: String,
    /// Content type declared by the client, if any.
    pub content_type: Option<String>,
}

impl UploadedArtifact {
    pub fn new(
        path: impl Into<PathBuf>,
        filename: impl Into<String>,
        content_type: Option<String>,
    ) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            content_type,
        }
    }

    /// Write uploaded bytes to a uniquely named file inside `dir`.
    ///
    /// The file keeps the declared filename's extension so type detection
    /// still works. Concurrent uploads with the same filename never collide.
    pub fn stage_bytes(
        bytes: &[u8],
        filename: &str,
        content_type: Option<String>,
        dir: &Path,
    ) -> Result<Self, ExtractError> {
        let suffix = extension_of(Path::new(filename))
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
        tmp.write_all(bytes)
            .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
        let (_, path) = tmp
            .keep()
            .map_err(|e| ExtractError::Internal(format!("tempfile keep: {e}")))?;
        debug!("Staged {} bytes for '{}' at {}", bytes.len(), filename, path.display());
        Ok(Self::new(path, filename, content_type))
    }

    /// Stage a copy of an existing file so the original is left untouched.
    pub fn stage_copy(
        source: &Path,
        content_type: Option<String>,
        dir: &Path,
    ) -> Result<Self, ExtractError> {
        let bytes = std::fs::read(source).map_err(|_| ExtractError::MissingFile {
            path: source.to_path_buf(),
        })?;
        let filename = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Self::stage_bytes(&bytes, &filename, content_type, dir)
    }

    /// Media kind from the declared filename, falling back to the disk path.
    pub fn media_kind(&self) -> MediaKind {
        match MediaKind::from_path(Path::new(&self.filename)) {
            MediaKind::Other(_) => MediaKind::from_path(&self.path),
            kind => kind,
        }
    }
}

/// Raster formats the image compressor can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
    Bmp,
    Tiff,
}

impl RasterFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Jpeg => "image/jpeg",
            RasterFormat::Png => "image/png",
            RasterFormat::Bmp => "image/bmp",
            RasterFormat::Tiff => "image/tiff",
        }
    }
}

/// What an artifact is, judged by its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Pdf,
    Image(RasterFormat),
    /// Anything else; carries the lowercase extension (empty when there is none).
    Other(String),
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        match extension_of(path).as_deref() {
            Some("pdf") => MediaKind::Pdf,
            Some("jpg" | "jpeg") => MediaKind::Image(RasterFormat::Jpeg),
            Some("png") => MediaKind::Image(RasterFormat::Png),
            Some("bmp") => MediaKind::Image(RasterFormat::Bmp),
            Some("tif" | "tiff") => MediaKind::Image(RasterFormat::Tiff),
            Some(other) => MediaKind::Other(other.to_string()),
            None => MediaKind::Other(String::new()),
        }
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        match self {
            MediaKind::Pdf => Some("application/pdf"),
            MediaKind::Image(f) => Some(f.mime_type()),
            MediaKind::Other(_) => None,
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Validate the upload exists and is non-empty; return its size in bytes.
pub async fn validate(path: &Path) -> Result<u64, ExtractError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(meta.len()),
        _ => Err(ExtractError::MissingFile {
            path: path.to_path_buf(),
        }),
    }
}

/// Current size of an artifact on disk.
pub async fn measure(path: &Path) -> Result<u64, ExtractError> {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.len())
        .map_err(|e| ExtractError::Internal(format!("stat {}: {e}", path.display())))
}

/// Deletes the file at `path` when dropped. Failures are logged, never raised.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
}

impl ArtifactGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed artifact {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {}: {}", self.path.display(), e),
        }
    }
}
