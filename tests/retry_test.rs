//! Provider-level retry: a retryable failure before any event has reached
//! the consumer gets retried automatically; once a real event has been
//! yielded, the hard cannot-retry-once-yielded invariant takes over and a
//! later failure passes straight through as a terminal error.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use agent_core::retry::{with_retry, RetryConfig, StreamFactory};
use agent_core::{AssistantBlock, Error, ErrorCategory, ProviderStream, StopReason, StreamEvent};
use futures::StreamExt;

fn fast_retry_config() -> RetryConfig {
    RetryConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 1,
        jitter_factor: 0.0,
    }
}

fn done_stream(text: &str) -> ProviderStream {
    let text = text.to_string();
    Box::pin(futures::stream::iter(vec![Ok(StreamEvent::Done {
        message: vec![AssistantBlock::Text(text)],
        stop_reason: StopReason::EndTurn,
        usage: None,
    })]))
}

#[tokio::test]
async fn a_retryable_open_failure_is_retried_before_any_event_is_yielded() {
    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let factory: StreamFactory = Box::new(move || {
        let attempts = attempts_clone.clone();
        Box::pin(async move {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::stream(ErrorCategory::RateLimit, "slow down"))
            } else {
                Ok(done_stream("recovered"))
            }
        })
    });

    let mut stream = with_retry(factory, fast_retry_config());

    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, StreamEvent::Retry { attempt: 1, .. }));

    let second = stream.next().await.unwrap().unwrap();
    match second {
        StreamEvent::Done { message, .. } => {
            assert_eq!(message, vec![AssistantBlock::Text("recovered".to_string())]);
        }
        other => panic!("expected a recovered Done event, got {other:?}"),
    }
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn a_mid_stream_failure_after_a_yielded_event_is_never_retried() {
    let factory: StreamFactory = Box::new(|| {
        Box::pin(async {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok(StreamEvent::TextDelta { delta: "partial".to_string() }),
                Ok(StreamEvent::Error {
                    category: ErrorCategory::RateLimit,
                    message: "connection reset".to_string(),
                    retry_after_ms: None,
                }),
            ])) as ProviderStream)
        })
    });

    let mut stream = with_retry(factory, fast_retry_config());

    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, StreamEvent::TextDelta { .. }));

    let second = stream.next().await.unwrap();
    assert!(matches!(second, Err(Error::Stream(ErrorCategory::RateLimit, _))));
}

#[tokio::test]
async fn a_non_retryable_category_is_surfaced_immediately() {
    let factory: StreamFactory = Box::new(|| Box::pin(async { Err(Error::stream(ErrorCategory::Auth, "bad api key")) }));

    let mut stream = with_retry(factory, fast_retry_config());
    let first = stream.next().await.unwrap();
    assert!(matches!(first, Err(Error::Stream(ErrorCategory::Auth, _))));
}
