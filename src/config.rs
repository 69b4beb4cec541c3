//! Configuration types for document extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. The config is established once at
//! startup and shared read-only across requests.
//!
//! Tool availability lives in a separate [`Capabilities`] value. It is checked
//! once with [`Capabilities::detect`] and handed to the extractor, which
//! never re-checks it per request.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

const MIB: u64 = 1024 * 1024;

/// Configuration for an extraction request.
///
/// # Example
/// ```rust
/// use edgequake_docread::ExtractionConfig;
/// use std::time::Duration;
///
/// let config = ExtractionConfig::builder()
///     .endpoint("https://my-resource.cognitiveservices.azure.com")
///     .api_key("secret")
///     .poll_timeout(Duration::from_secs(60))
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Base URL of the analysis service.
    pub endpoint: String,

    /// Subscription key sent with every request. Redacted in `Debug`.
    pub api_key: String,

    /// Analysis model. Default: `prebuilt-layout`.
    pub model_id: String,

    /// API version query parameter. Default: `2024-11-30`.
    pub api_version: String,

    /// Size above which compression is attempted. Default: 4 MiB.
    ///
    /// Not a rejection limit; see `hard_ceiling_bytes`.
    pub soft_threshold_bytes: u64,

    /// Largest payload the analysis service accepts. Default: 50 MiB.
    ///
    /// An artifact still above this after compression is always rejected.
    pub hard_ceiling_bytes: u64,

    /// Wait between status polls while the job is running. Default: 1 s.
    ///
    /// Also the first step of the 429 backoff sequence.
    pub poll_interval: Duration,

    /// Overall polling deadline, measured from the first poll. Default: 120 s.
    pub poll_timeout: Duration,

    /// Ceiling for the doubling 429 backoff. Default: 30 s.
    pub max_backoff: Duration,

    /// Fixed delay after a 5xx poll response. Default: 2 s.
    pub server_error_delay: Duration,

    /// Per-HTTP-call timeout. Default: 30 s.
    pub request_timeout: Duration,

    /// Longest side of a compressed image, in pixels. Default: 2000.
    pub max_image_dimension: u32,

    /// JPEG quality for compressed images (1–100). Default: 60.
    pub image_quality: u8,

    /// Ghostscript `-dPDFSETTINGS` preset. Default: [`PdfPreset::Screen`].
    pub pdf_preset: PdfPreset,

    /// Ghostscript executable name or path. Default: `gs`.
    pub ghostscript_bin: String,

    /// Upper bound on one compression run. Default: 120 s.
    pub compression_timeout: Duration,

    /// Directory for compressed artifacts. `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,

    /// Optional progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: String::new(),
            model_id: "prebuilt-layout".to_string(),
            api_version: "2024-11-30".to_string(),
            soft_threshold_bytes: 4 * MIB,
            hard_ceiling_bytes: 50 * MIB,
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(120),
            max_backoff: Duration::from_secs(30),
            server_error_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            max_image_dimension: 2000,
            image_quality: 60,
            pdf_preset: PdfPreset::default(),
            ghostscript_bin: "gs".to_string(),
            compression_timeout: Duration::from_secs(120),
            work_dir: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .field("soft_threshold_bytes", &self.soft_threshold_bytes)
            .field("hard_ceiling_bytes", &self.hard_ceiling_bytes)
            .field("poll_interval", &self.poll_interval)
            .field("poll_timeout", &self.poll_timeout)
            .field("max_backoff", &self.max_backoff)
            .field("server_error_delay", &self.server_error_delay)
            .field("max_image_dimension", &self.max_image_dimension)
            .field("image_quality", &self.image_quality)
            .field("pdf_preset", &self.pdf_preset)
            .field("ghostscript_bin", &self.ghostscript_bin)
            .field("work_dir", &self.work_dir)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory where compressed artifacts are written.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.config.model_id = model.into();
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    pub fn soft_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.soft_threshold_bytes = bytes;
        self
    }

    pub fn hard_ceiling_bytes(mut self, bytes: u64) -> Self {
        self.config.hard_ceiling_bytes = bytes;
        self
    }

    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.config.poll_interval = d;
        self
    }

    pub fn poll_timeout(mut self, d: Duration) -> Self {
        self.config.poll_timeout = d;
        self
    }

    pub fn max_backoff(mut self, d: Duration) -> Self {
        self.config.max_backoff = d;
        self
    }

    pub fn server_error_delay(mut self, d: Duration) -> Self {
        self.config.server_error_delay = d;
        self
    }

    pub fn request_timeout(mut self, d: Duration) -> Self {
        self.config.request_timeout = d;
        self
    }

    pub fn max_image_dimension(mut self, px: u32) -> Self {
        self.config.max_image_dimension = px.max(1);
        self
    }

    pub fn image_quality(mut self, q: u8) -> Self {
        self.config.image_quality = q.clamp(1, 100);
        self
    }

    pub fn pdf_preset(mut self, preset: PdfPreset) -> Self {
        self.config.pdf_preset = preset;
        self
    }

    pub fn ghostscript_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.ghostscript_bin = bin.into();
        self
    }

    pub fn compression_timeout(mut self, d: Duration) -> Self {
        self.config.compression_timeout = d;
        self
    }

    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.hard_ceiling_bytes < c.soft_threshold_bytes {
            return Err(ExtractError::InvalidConfig(format!(
                "hard ceiling ({} bytes) must be at least the soft threshold ({} bytes)",
                c.hard_ceiling_bytes, c.soft_threshold_bytes
            )));
        }
        if c.poll_interval.is_zero() {
            return Err(ExtractError::InvalidConfig(
                "poll interval must be greater than zero".into(),
            ));
        }
        if c.max_backoff < c.poll_interval {
            return Err(ExtractError::InvalidConfig(format!(
                "max backoff ({:?}) must be at least the poll interval ({:?})",
                c.max_backoff, c.poll_interval
            )));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Ghostscript output quality preset.
///
/// | Preset | Resolution | Use |
/// |--------|-----------|-----|
/// | `Screen` | 72 dpi | smallest output (default) |
/// | `Ebook` | 150 dpi | moderate |
/// | `Printer` | 300 dpi | large |
/// | `Prepress` | 300 dpi, colour preserving | largest |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfPreset {
    #[default]
    Screen,
    Ebook,
    Printer,
    Prepress,
}

impl PdfPreset {
    /// Value for `-dPDFSETTINGS`.
    pub fn as_arg(self) -> &'static str {
        match self {
            PdfPreset::Screen => "/screen",
            PdfPreset::Ebook => "/ebook",
            PdfPreset::Printer => "/printer",
            PdfPreset::Prepress => "/prepress",
        }
    }
}

// ── Capabilities ─────────────────────────────────────────────────────────

/// External tools found at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Ghostscript answered `--version`.
    pub pdf_compression: bool,
}

impl Capabilities {
    /// No external tools.
    pub fn none() -> Self {
        Self::default()
    }

    /// Look for external tools. Call once during initialisation.
    pub async fn detect(config: &ExtractionConfig) -> Self {
        let pdf_compression = tool_answers(&config.ghostscript_bin).await;
        if pdf_compression {
            info!("Ghostscript available ({}): PDF compression enabled", config.ghostscript_bin);
        } else {
            info!(
                "Ghostscript not found ({}): oversized PDFs will be rejected",
                config.ghostscript_bin
            );
        }
        Self { pdf_compression }
    }
}

async fn tool_answers(bin: &str) -> bool {
    let status = tokio::process::Command::new(bin)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match status {
        Ok(s) => s.success(),
        Err(e) => {
            debug!("Running '{} --version' failed: {}", bin, e);
            false
        }
    }
}
