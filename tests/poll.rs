//! Timing tests for the poll loop, driven on virtual time.

mod common;

use common::*;
use edgequake_docread::{AnalysisClient, ExtractError, OperationHandle, PollPolicy, PollReply};
use serde_json::json;
use std::time::Duration;

fn policy(timeout_secs: u64) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(timeout_secs),
        max_backoff: Duration::from_secs(30),
        server_error_delay: Duration::from_secs(2),
    }
}

fn handle() -> OperationHandle {
    OperationHandle::new(OPERATION)
}

#[tokio::test]
async fn three_429s_then_success_backs_off_1_2_4() {
    let clock = FakeClock::new();
    let transport = FakeTransport::new(
        clock.clone(),
        vec![
            PollReply::status(429),
            PollReply::status(429),
            PollReply::status(429),
            succeeded(json!([ { "pageNumber": 1, "content": "Done." } ])),
        ],
    );
    let client = AnalysisClient::new(transport.clone(), clock.clone(), policy(120));

    let doc = client.poll(&handle()).await.unwrap();
    assert_eq!(doc["status"], "succeeded");

    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(clock.total_slept(), Duration::from_secs(7));
    assert_eq!(transport.fetch_times().len(), 4);
}

#[tokio::test]
async fn backoff_is_capped_at_max() {
    let clock = FakeClock::new();
    let mut replies = vec![PollReply::status(429); 7];
    replies.push(succeeded(json!([])));
    let transport = FakeTransport::new(clock.clone(), replies);
    let client = AnalysisClient::new(transport, clock.clone(), policy(600));

    client.poll(&handle()).await.unwrap();
    let secs: Vec<u64> = clock.sleeps().iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![1, 2, 4, 8, 16, 30, 30]);
}

#[tokio::test]
async fn running_forever_times_out_without_polling_past_deadline() {
    let clock = FakeClock::new();
    let transport = FakeTransport::new(clock.clone(), vec![running()]);
    let client = AnalysisClient::new(transport.clone(), clock.clone(), policy(10));

    let err = client.poll(&handle()).await.unwrap_err();
    match err {
        ExtractError::PollTimeout { secs, polls } => {
            assert_eq!(secs, 10);
            assert_eq!(polls, 10);
        }
        other => panic!("unexpected {other:?}"),
    }

    let times = transport.fetch_times();
    assert!(times.iter().all(|t| *t < Duration::from_secs(10)));
    assert_eq!(clock.elapsed(), Duration::from_secs(10));
}

#[tokio::test]
async fn sleep_is_clamped_to_the_deadline() {
    let clock = FakeClock::new();
    let transport = FakeTransport::new(clock.clone(), vec![PollReply::status(429)]);
    let client = AnalysisClient::new(transport, clock.clone(), policy(5));

    let err = client.poll(&handle()).await.unwrap_err();
    assert!(matches!(err, ExtractError::PollTimeout { .. }));
    // 1 + 2, then a 4 s backoff cut to the remaining 2 s.
    let secs: Vec<u64> = clock.sleeps().iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![1, 2, 2]);
}

#[tokio::test]
async fn server_errors_retry_at_fixed_delay() {
    let clock = FakeClock::new();
    let transport = FakeTransport::new(
        clock.clone(),
        vec![
            PollReply::status(503),
            PollReply::status(500),
            running(),
            succeeded(json!([])),
        ],
    );
    let client = AnalysisClient::new(transport, clock.clone(), policy(120));

    client.poll(&handle()).await.unwrap();
    let secs: Vec<u64> = clock.sleeps().iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![2, 2, 1]);
}

#[tokio::test]
async fn server_error_between_429s_keeps_the_streak() {
    let clock = FakeClock::new();
    let transport = FakeTransport::new(
        clock.clone(),
        vec![
            PollReply::status(429),
            PollReply::status(502),
            PollReply::status(429),
            running(),
            PollReply::status(429),
            succeeded(json!([])),
        ],
    );
    let client = AnalysisClient::new(transport, clock.clone(), policy(120));

    client.poll(&handle()).await.unwrap();
    let secs: Vec<u64> = clock.sleeps().iter().map(Duration::as_secs).collect();
    assert_eq!(secs, vec![1, 2, 2, 1, 1]);
}

#[tokio::test]
async fn client_error_status_is_terminal() {
    let clock = FakeClock::new();
    let transport = FakeTransport::new(
        clock.clone(),
        vec![PollReply {
            status: 404,
            retry_after: None,
            body: "not found".into(),
        }],
    );
    let client = AnalysisClient::new(transport.clone(), clock.clone(), policy(120));

    let err = client.poll(&handle()).await.unwrap_err();
    assert!(matches!(err, ExtractError::PollError { status: Some(404), .. }));
    assert_eq!(transport.fetch_times().len(), 1);
    assert!(clock.sleeps().is_empty());
}
