//! PDF compression through Ghostscript's `pdfwrite` device.
//!
//! The tool runs as an async child process so a slow rewrite never stalls the
//! runtime. `kill_on_drop` ties the process to the request: if the request
//! future is dropped (client disconnect, abort) the child is killed.

use crate::config::{ExtractionConfig, PdfPreset};
use crate::error::ExtractError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

/// Rewrites a PDF into a smaller one at `output`.
#[async_trait]
pub trait PdfCompressor: Send + Sync {
    async fn compress(&self, input: &Path, output: &Path) -> Result<(), ExtractError>;
}

/// [`PdfCompressor`] backed by the `gs` command-line tool.
#[derive(Debug, Clone)]
pub struct Ghostscript {
    bin: String,
    preset: PdfPreset,
    timeout: Duration,
}

impl Ghostscript {
    pub fn new(bin: impl Into<String>, preset: PdfPreset, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            preset,
            timeout,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.ghostscript_bin.clone(),
            config.pdf_preset,
            config.compression_timeout,
        )
    }

    /// Arguments for one rewrite, excluding the binary.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS={}", self.preset.as_arg()),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
            format!("-sOutputFile={}", output.display()),
            input.display().to_string(),
        ]
    }
}

#[async_trait]
impl PdfCompressor for Ghostscript {
    async fn compress(&self, input: &Path, output: &Path) -> Result<(), ExtractError> {
        let args = self.args(input, output);
        info!("Compressing PDF {} ({})", input.display(), self.preset.as_arg());
        debug!("{} {}", self.bin, args.join(" "));

        let child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExtractError::CompressionFailed {
                detail: format!("cannot start {}: {e}", self.bin),
            })?;

        let result = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractError::CompressionFailed {
                detail: format!("{} timed out after {}s", self.bin, self.timeout.as_secs()),
            })?
            .map_err(|e| ExtractError::CompressionFailed {
                detail: format!("{} failed: {e}", self.bin),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ExtractError::CompressionFailed {
                detail: format!("{} exited with {}: {}", self.bin, result.status, stderr.trim()),
            });
        }
        Ok(())
    }
}
