//! CLI binary for edgequake-docread.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one file through the extractor and prints the
//! JSON response.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docread::{
    ExtractionConfig, ExtractionProgressCallback, Extractor, PdfPreset, ProgressCallback,
    UploadedArtifact,
};
use futures::future::AbortHandle;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner that follows a single request through compression and polling.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_compression_start(&self, kind: &str, size: u64) {
        self.bar.set_prefix("Compressing");
        self.bar.set_message(format!("{kind}, {size} bytes"));
    }

    fn on_compressed(&self, before: u64, after: u64) {
        self.bar.println(format!(
            "  {} compressed {} → {} bytes",
            green("✓"),
            before,
            after
        ));
    }

    fn on_submitted(&self, _operation: &str) {
        self.bar.set_prefix("Analysing");
        self.bar.set_message("submitted");
    }

    fn on_poll(&self, poll: u32, status: &str) {
        self.bar.set_message(format!("poll #{poll}: {status}"));
    }

    fn on_backoff(&self, http_status: u16, delay: Duration) {
        self.bar.set_message(format!(
            "HTTP {http_status}, retrying in {:.1}s",
            delay.as_secs_f64()
        ));
    }

    fn on_complete(&self, page_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} pages extracted", green("✔"), page_count);
    }
}

/// Extract per-page sentences from a PDF or image via a document-analysis service.
#[derive(Parser, Debug)]
#[command(
    name = "docread",
    version,
    about = "Extract per-page sentences from PDFs and images via a document-analysis service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// PDF or image file to analyse. The file itself is never modified.
    input: PathBuf,

    /// Content type to declare for the upload (default: from extension).
    #[arg(long)]
    content_type: Option<String>,

    /// Analysis service base URL.
    #[arg(long, env = "DOCREAD_ENDPOINT")]
    endpoint: String,

    /// Analysis service subscription key.
    #[arg(long, env = "DOCREAD_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Analysis model id.
    #[arg(long, env = "DOCREAD_MODEL", default_value = "prebuilt-layout")]
    model: String,

    /// Compress files larger than this many bytes.
    #[arg(long, env = "DOCREAD_SOFT_LIMIT", default_value_t = 4 * 1024 * 1024)]
    soft_limit: u64,

    /// Reject files still larger than this many bytes after compression.
    #[arg(long, env = "DOCREAD_HARD_LIMIT", default_value_t = 50 * 1024 * 1024)]
    hard_limit: u64,

    /// Seconds between status polls.
    #[arg(long, env = "DOCREAD_POLL_INTERVAL", default_value_t = 1.0)]
    poll_interval: f64,

    /// Give up polling after this many seconds.
    #[arg(long, env = "DOCREAD_POLL_TIMEOUT", default_value_t = 120)]
    poll_timeout: u64,

    /// Longest side of a compressed image, in pixels.
    #[arg(long, env = "DOCREAD_MAX_DIMENSION", default_value_t = 2000)]
    max_dimension: u32,

    /// JPEG quality for compressed images (1–100).
    #[arg(long, env = "DOCREAD_IMAGE_QUALITY", default_value_t = 60)]
    image_quality: u8,

    /// Ghostscript preset for compressed PDFs.
    #[arg(long, env = "DOCREAD_PDF_PRESET", value_enum, default_value = "screen")]
    pdf_preset: PresetArg,

    /// Ghostscript binary.
    #[arg(long, env = "DOCREAD_GS", default_value = "gs")]
    ghostscript: String,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCREAD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCREAD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except the JSON result.
    #[arg(short, long, env = "DOCREAD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PresetArg {
    Screen,
    Ebook,
    Printer,
    Prepress,
}

impl From<PresetArg> for PdfPreset {
    fn from(v: PresetArg) -> Self {
        match v {
            PresetArg::Screen => PdfPreset::Screen,
            PresetArg::Ebook => PdfPreset::Ebook,
            PresetArg::Printer => PdfPreset::Printer,
            PresetArg::Prepress => PdfPreset::Prepress,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress)?;
    let extractor = Extractor::connect(config)
        .await
        .context("Failed to initialise extractor")?;

    // Work on a staged copy: the extractor deletes what it is given.
    let upload = UploadedArtifact::stage_copy(
        &cli.input,
        cli.content_type.clone(),
        &extractor.config().work_dir(),
    )
    .with_context(|| format!("Failed to read {}", cli.input.display()))?;

    // ── Ctrl-C aborts the request; cleanup still runs ────────────────────
    let (abort, registration) = AbortHandle::new_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            abort.abort();
        }
    });

    let result = extractor.extract_with_abort(upload, registration).await;

    let (json, code) = match result {
        Ok(output) => (to_json(&output, cli.pretty)?, ExitCode::SUCCESS),
        Err(e) => {
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), dim(&format!("HTTP {}", e.status_code())));
            }
            (to_json(&e.to_response(), cli.pretty)?, ExitCode::FAILURE)
        }
    };
    println!("{json}");
    Ok(code)
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("Failed to serialise output")
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let poll_interval = Duration::try_from_secs_f64(cli.poll_interval)
        .context("Invalid --poll-interval")?;

    let mut builder = ExtractionConfig::builder()
        .endpoint(cli.endpoint.clone())
        .api_key(cli.api_key.clone())
        .model_id(cli.model.clone())
        .soft_threshold_bytes(cli.soft_limit)
        .hard_ceiling_bytes(cli.hard_limit)
        .poll_interval(poll_interval)
        .poll_timeout(Duration::from_secs(cli.poll_timeout))
        .max_image_dimension(cli.max_dimension)
        .image_quality(cli.image_quality)
        .pdf_preset(cli.pdf_preset.clone().into())
        .ghostscript_bin(cli.ghostscript.clone());

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
