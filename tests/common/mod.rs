//! In-memory collaborators for driving the extractor without a network,
//! Ghostscript, or real time.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_docread::{
    AnalysisTransport, Capabilities, Clock, ExtractError, ExtractionConfig, Extractor,
    PdfCompressor, PollReply, SubmitReply, TransportError,
};
use futures::future::AbortHandle;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ── Clock ────────────────────────────────────────────────────────────────────

/// Virtual time: `sleep` advances the clock instantly and records the delay.
pub struct FakeClock {
    base: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        })
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap() += duration;
        self.sleeps.lock().unwrap().push(duration);
        // Give an abort a chance to land between polls.
        tokio::task::yield_now().await;
    }
}

// ── Transport ────────────────────────────────────────────────────────────────

/// What the transport saw at submission time.
#[derive(Debug, Clone)]
pub struct Submission {
    pub path: PathBuf,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Scripted transport. Poll replies are served in order; the last one repeats.
pub struct FakeTransport {
    clock: Arc<FakeClock>,
    submit_reply: Mutex<Result<SubmitReply, TransportError>>,
    replies: Mutex<VecDeque<PollReply>>,
    last: Mutex<Option<PollReply>>,
    submissions: Mutex<Vec<Submission>>,
    fetch_times: Mutex<Vec<Duration>>,
    abort_after: Mutex<Option<(usize, AbortHandle)>>,
}

pub const OPERATION: &str = "https://svc.example/documentintelligence/documentModels/prebuilt-layout/analyzeResults/op-1";

impl FakeTransport {
    pub fn new(clock: Arc<FakeClock>, replies: Vec<PollReply>) -> Arc<Self> {
        Arc::new(Self {
            clock,
            submit_reply: Mutex::new(Ok(accepted())),
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            fetch_times: Mutex::new(Vec::new()),
            abort_after: Mutex::new(None),
        })
    }

    pub fn with_submit_reply(self: Arc<Self>, reply: SubmitReply) -> Arc<Self> {
        *self.submit_reply.lock().unwrap() = Ok(reply);
        self
    }

    /// Abort `handle` once `fetches` polls have been served.
    pub fn abort_after(&self, fetches: usize, handle: AbortHandle) {
        *self.abort_after.lock().unwrap() = Some((fetches, handle));
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn fetch_times(&self) -> Vec<Duration> {
        self.fetch_times.lock().unwrap().clone()
    }
}

pub fn accepted() -> SubmitReply {
    SubmitReply {
        status: 202,
        operation_location: Some(OPERATION.to_string()),
        body: String::new(),
    }
}

#[async_trait]
impl AnalysisTransport for FakeTransport {
    async fn submit(&self, path: &Path, content_type: &str) -> Result<SubmitReply, TransportError> {
        let bytes = std::fs::read(path).unwrap_or_default();
        self.submissions.lock().unwrap().push(Submission {
            path: path.to_path_buf(),
            content_type: content_type.to_string(),
            bytes,
        });
        self.submit_reply.lock().unwrap().clone()
    }

    async fn fetch(&self, operation: &str) -> Result<PollReply, TransportError> {
        assert_eq!(operation, OPERATION);
        let served = {
            let mut times = self.fetch_times.lock().unwrap();
            times.push(self.clock.elapsed());
            times.len()
        };
        if let Some((after, handle)) = self.abort_after.lock().unwrap().as_ref() {
            if served >= *after {
                handle.abort();
            }
        }

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Ok(reply)
            }
            None => last
                .clone()
                .ok_or_else(|| TransportError("no scripted reply".into())),
        }
    }
}

// ── PDF compressor ───────────────────────────────────────────────────────────

/// Writes a fixed number of bytes instead of running Ghostscript.
pub struct FakePdfCompressor {
    output_len: usize,
    calls: Mutex<u32>,
}

impl FakePdfCompressor {
    pub fn new(output_len: usize) -> Arc<Self> {
        Arc::new(Self {
            output_len,
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl PdfCompressor for FakePdfCompressor {
    async fn compress(&self, _input: &Path, output: &Path) -> Result<(), ExtractError> {
        *self.calls.lock().unwrap() += 1;
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.resize(self.output_len.max(bytes.len()), b' ');
        tokio::fs::write(output, bytes).await?;
        Ok(())
    }
}

// ── Replies ──────────────────────────────────────────────────────────────────

pub fn running() -> PollReply {
    PollReply::ok(r#"{"status":"running"}"#)
}

pub fn succeeded(pages: serde_json::Value) -> PollReply {
    PollReply::ok(
        serde_json::json!({
            "status": "succeeded",
            "analyzeResult": { "pages": pages }
        })
        .to_string(),
    )
}

// ── Wiring ───────────────────────────────────────────────────────────────────

pub fn test_config(work_dir: &Path) -> ExtractionConfig {
    ExtractionConfig::builder()
        .endpoint("https://svc.example")
        .api_key("test-key")
        .soft_threshold_bytes(1024)
        .hard_ceiling_bytes(8 * 1024)
        .poll_interval(Duration::from_secs(1))
        .poll_timeout(Duration::from_secs(30))
        .max_backoff(Duration::from_secs(16))
        .server_error_delay(Duration::from_secs(2))
        .max_image_dimension(64)
        .work_dir(work_dir)
        .build()
        .unwrap()
}

pub fn extractor(
    config: ExtractionConfig,
    capabilities: Capabilities,
    transport: Arc<FakeTransport>,
    clock: Arc<FakeClock>,
    pdf: Arc<FakePdfCompressor>,
) -> Extractor {
    Extractor::with_parts(config, capabilities, transport, clock, pdf)
}

/// Files left in `dir`.
pub fn leftovers(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}
