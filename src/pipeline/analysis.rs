//! Analysis client: submit an artifact, then poll the job to a terminal state.
//!
//! ## Submission contract
//!
//! A submission is accepted only when the reply is 2xx (202 in practice)
//! *and* carries an `Operation-Location` header. A 2xx reply without that
//! header leaves nothing to poll, so it fails with
//! [`SubmitFailure::NoOperationLocation`].
//!
//! ## Poll state machine
//!
//! ```text
//!              ┌────────── 2xx running / 5xx ──────────┐
//!              ▼                                        │
//!   ──▶ Running ──── 429 ───▶ BackingOff(n) ── 429 ──▶ BackingOff(n+1)
//!          │  ▲                    │
//!          │  └── 2xx running ─────┘
//!          ▼
//!       Terminal: succeeded │ failed │ PollError │ PollTimeout
//! ```
//!
//! [`PollMachine`] is the pure transition function: it takes one poll reply
//! and says how long to wait or how the job ended. [`AnalysisClient::poll`]
//! drives it with one suspending wait per iteration, checking the deadline
//! before every poll. Time comes from a [`Clock`], so tests can run the whole
//! loop against a fake clock without sleeping.
//!
//! Wait policy:
//! - job still running: `poll_interval`
//! - 429: `poll_interval · 2^(n-1)` for the n-th consecutive 429, capped at
//!   `max_backoff` (a longer numeric `Retry-After` wins, still capped). The
//!   count resets on the next successful reply.
//! - 5xx: `server_error_delay`, no retry limit other than the deadline

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, SubmitFailure};
use crate::pipeline::transport::{AnalysisTransport, PollReply, TransportError};
use crate::progress::ProgressCallback;
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ── Clock ────────────────────────────────────────────────────────────────

/// Time source for the poll loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Real time via `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ── Policy ───────────────────────────────────────────────────────────────

/// Timing knobs for the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
    pub max_backoff: Duration,
    pub server_error_delay: Duration,
}

impl PollPolicy {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
            max_backoff: config.max_backoff,
            server_error_delay: config.server_error_delay,
        }
    }

    /// Delay after the `n`-th consecutive 429 (1-based).
    pub fn rate_limit_delay(&self, n: u32) -> Duration {
        let factor = 2u32.saturating_pow(n.saturating_sub(1));
        self.interval
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

// ── State machine ────────────────────────────────────────────────────────

/// Where the poll loop stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Running,
    /// Waiting after `consecutive` 429 replies in a row.
    BackingOff { consecutive: u32 },
    Terminal,
}

/// Why the loop is waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitReason {
    /// The job reported a non-terminal status.
    Running { status: String },
    RateLimited,
    ServerError { status: u16 },
}

/// Outcome of one poll.
#[derive(Debug)]
pub enum Step {
    Wait { delay: Duration, reason: WaitReason },
    Done(Result<Value, ExtractError>),
}

/// Pure transition function for the poll loop.
#[derive(Debug, Clone)]
pub struct PollMachine {
    policy: PollPolicy,
    state: PollState,
}

impl PollMachine {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            state: PollState::Running,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    /// Consecutive 429s seen so far.
    fn consecutive_429(&self) -> u32 {
        match self.state {
            PollState::BackingOff { consecutive } => consecutive,
            _ => 0,
        }
    }

    pub fn on_reply(&mut self, reply: &PollReply) -> Step {
        match reply.status {
            429 => {
                let n = self.consecutive_429() + 1;
                let computed = self.policy.rate_limit_delay(n);
                let delay = reply
                    .retry_after
                    .map_or(computed, |ra| ra.max(computed))
                    .min(self.policy.max_backoff);
                self.state = PollState::BackingOff { consecutive: n };
                Step::Wait {
                    delay,
                    reason: WaitReason::RateLimited,
                }
            }
            // A 5xx is not a successful reply, so any 429 streak is kept.
            500..=599 => Step::Wait {
                delay: self.policy.server_error_delay,
                reason: WaitReason::ServerError {
                    status: reply.status,
                },
            },
            200..=299 => {
                self.state = PollState::Running;
                self.on_job_document(reply)
            }
            status => self.finish(Err(ExtractError::PollError {
                status: Some(status),
                detail: format!("HTTP {status}: {}", reply.body),
            })),
        }
    }

    pub fn on_transport_error(&mut self, error: &TransportError) -> Step {
        self.finish(Err(ExtractError::PollError {
            status: None,
            detail: error.to_string(),
        }))
    }

    fn on_job_document(&mut self, reply: &PollReply) -> Step {
        let document: Value = match serde_json::from_str(&reply.body) {
            Ok(v) => v,
            Err(e) => {
                return self.finish(Err(ExtractError::PollError {
                    status: Some(reply.status),
                    detail: format!("invalid status document: {e}: {}", reply.body),
                }))
            }
        };

        let status = document
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        if status.eq_ignore_ascii_case("succeeded") {
            self.finish(Ok(document))
        } else if status.eq_ignore_ascii_case("failed") {
            self.finish(Err(ExtractError::OperationFailed {
                payload: reply.body.clone(),
            }))
        } else {
            Step::Wait {
                delay: self.policy.interval,
                reason: WaitReason::Running { status },
            }
        }
    }

    fn finish(&mut self, result: Result<Value, ExtractError>) -> Step {
        self.state = PollState::Terminal;
        Step::Done(result)
    }
}

// ── Client ───────────────────────────────────────────────────────────────

/// Opaque reference to a submitted job (the operation-location URL).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Submits artifacts and polls jobs through an [`AnalysisTransport`].
#[derive(Clone)]
pub struct AnalysisClient {
    transport: Arc<dyn AnalysisTransport>,
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    progress: Option<ProgressCallback>,
}

impl AnalysisClient {
    pub fn new(
        transport: Arc<dyn AnalysisTransport>,
        clock: Arc<dyn Clock>,
        policy: PollPolicy,
    ) -> Self {
        Self {
            transport,
            clock,
            policy,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Upload the artifact and return the job handle.
    pub async fn submit(
        &self,
        path: &Path,
        content_type: &str,
    ) -> Result<OperationHandle, ExtractError> {
        let reply = self
            .transport
            .submit(path, content_type)
            .await
            .map_err(|e| SubmitFailure::Transport(e.0))?;

        if !(200..300).contains(&reply.status) {
            return Err(SubmitFailure::Rejected {
                status: reply.status,
                body: reply.body,
            }
            .into());
        }

        let location = reply
            .operation_location
            .filter(|l| !l.trim().is_empty())
            .ok_or(SubmitFailure::NoOperationLocation)?;

        info!("Submitted {} → HTTP {}", path.display(), reply.status);
        if let Some(ref cb) = self.progress {
            cb.on_submitted(&location);
        }
        Ok(OperationHandle::new(location))
    }

    /// Poll `handle` until the job succeeds, fails, or the deadline passes.
    ///
    /// Returns the full status document on success.
    pub async fn poll(&self, handle: &OperationHandle) -> Result<Value, ExtractError> {
        let started = self.clock.now();
        let mut machine = PollMachine::new(self.policy);
        let mut polls: u32 = 0;

        loop {
            let elapsed = self.clock.now().saturating_duration_since(started);
            if elapsed >= self.policy.timeout {
                warn!("Polling timed out after {:?} ({} polls)", elapsed, polls);
                return Err(ExtractError::PollTimeout {
                    secs: self.policy.timeout.as_secs(),
                    polls,
                });
            }

            polls += 1;
            let step = match self.transport.fetch(handle.as_str()).await {
                Ok(reply) => machine.on_reply(&reply),
                Err(e) => machine.on_transport_error(&e),
            };

            match step {
                Step::Done(result) => {
                    if let Some(ref cb) = self.progress {
                        let status = match &result {
                            Ok(_) => "succeeded",
                            Err(ExtractError::OperationFailed { .. }) => "failed",
                            Err(_) => "error",
                        };
                        cb.on_poll(polls, status);
                    }
                    debug!("Polling finished after {} polls", polls);
                    return result;
                }
                Step::Wait { delay, reason } => {
                    match &reason {
                        WaitReason::Running { status } => {
                            debug!("Poll {}: job status '{}'", polls, status);
                            if let Some(ref cb) = self.progress {
                                cb.on_poll(polls, status);
                            }
                        }
                        WaitReason::RateLimited => {
                            warn!("Poll {}: rate limited, backing off {:?}", polls, delay);
                            if let Some(ref cb) = self.progress {
                                cb.on_backoff(429, delay);
                            }
                        }
                        WaitReason::ServerError { status } => {
                            warn!("Poll {}: HTTP {}, retrying in {:?}", polls, status, delay);
                            if let Some(ref cb) = self.progress {
                                cb.on_backoff(*status, delay);
                            }
                        }
                    }
                    // Never sleep past the deadline.
                    let elapsed = self.clock.now().saturating_duration_since(started);
                    let remaining = self.policy.timeout.saturating_sub(elapsed);
                    self.clock.sleep(delay.min(remaining)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            max_backoff: Duration::from_secs(5),
            server_error_delay: Duration::from_millis(250),
        }
    }

    fn wait_delay(step: Step) -> Duration {
        match step {
            Step::Wait { delay, .. } => delay,
            Step::Done(r) => panic!("expected wait, got done: {r:?}"),
        }
    }

    #[test]
    fn rate_limit_delay_doubles_and_caps() {
        let p = policy();
        let seq: Vec<u64> = (1..=5).map(|n| p.rate_limit_delay(n).as_secs()).collect();
        assert_eq!(seq, vec![1, 2, 4, 5, 5]);
        assert_eq!(p.rate_limit_delay(64), p.max_backoff);
    }

    #[test]
    fn consecutive_429s_back_off_then_reset() {
        let mut m = PollMachine::new(policy());
        let d1 = wait_delay(m.on_reply(&PollReply::status(429)));
        let d2 = wait_delay(m.on_reply(&PollReply::status(429)));
        assert_eq!((d1.as_secs(), d2.as_secs()), (1, 2));
        assert_eq!(m.state(), PollState::BackingOff { consecutive: 2 });

        let running = m.on_reply(&PollReply::ok(r#"{"status":"running"}"#));
        assert_eq!(wait_delay(running), Duration::from_secs(1));
        assert_eq!(m.state(), PollState::Running);

        let d3 = wait_delay(m.on_reply(&PollReply::status(429)));
        assert_eq!(d3.as_secs(), 1, "streak resets after a successful poll");
    }

    #[test]
    fn server_error_keeps_429_streak() {
        let mut m = PollMachine::new(policy());
        m.on_reply(&PollReply::status(429));
        let d = wait_delay(m.on_reply(&PollReply::status(503)));
        assert_eq!(d, Duration::from_millis(250));
        let d = wait_delay(m.on_reply(&PollReply::status(429)));
        assert_eq!(d.as_secs(), 2);
    }

    #[test]
    fn retry_after_extends_but_is_capped() {
        let mut m = PollMachine::new(policy());
        let reply = PollReply {
            status: 429,
            retry_after: Some(Duration::from_secs(3)),
            body: String::new(),
        };
        assert_eq!(wait_delay(m.on_reply(&reply)).as_secs(), 3);

        let mut m = PollMachine::new(policy());
        let reply = PollReply {
            status: 429,
            retry_after: Some(Duration::from_secs(600)),
            body: String::new(),
        };
        assert_eq!(wait_delay(m.on_reply(&reply)).as_secs(), 5);
    }

    #[test]
    fn succeeded_returns_document() {
        let mut m = PollMachine::new(policy());
        let step = m.on_reply(&PollReply::ok(r#"{"status":"Succeeded","analyzeResult":{}}"#));
        match step {
            Step::Done(Ok(doc)) => assert!(doc.get("analyzeResult").is_some()),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(m.state(), PollState::Terminal);
    }

    #[test]
    fn failed_carries_payload() {
        let mut m = PollMachine::new(policy());
        let body = r#"{"status":"failed","error":{"code":"InvalidRequest"}}"#;
        match m.on_reply(&PollReply::ok(body)) {
            Step::Done(Err(ExtractError::OperationFailed { payload })) => assert_eq!(payload, body),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_running() {
        let mut m = PollMachine::new(policy());
        for body in [r#"{"status":"notStarted"}"#, r#"{}"#] {
            match m.on_reply(&PollReply::ok(body)) {
                Step::Wait {
                    reason: WaitReason::Running { .. },
                    ..
                } => {}
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn client_errors_and_bad_json_are_terminal() {
        let mut m = PollMachine::new(policy());
        let reply = PollReply {
            status: 404,
            retry_after: None,
            body: "ResourceNotFound".into(),
        };
        match m.on_reply(&reply) {
            Step::Done(Err(ExtractError::PollError { status, detail })) => {
                assert_eq!(status, Some(404));
                assert!(detail.contains("ResourceNotFound"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut m = PollMachine::new(policy());
        assert!(matches!(
            m.on_reply(&PollReply::ok("<html>")),
            Step::Done(Err(ExtractError::PollError { .. }))
        ));

        let mut m = PollMachine::new(policy());
        assert!(matches!(
            m.on_transport_error(&TransportError("connection reset".into())),
            Step::Done(Err(ExtractError::PollError { status: None, .. }))
        ));
    }
}
