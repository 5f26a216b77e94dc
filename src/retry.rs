//! Retry policy for provider stream failures: exponential backoff with
//! jitter, `Retry-After` hint handling, and the hard
//! cannot-retry-once-yielded invariant.
//!
//! [`with_retry`] is the piece a provider adapter actually calls: it turns a
//! stream-opening factory into a single [`ProviderStream`] that retries
//! itself, under the hood, for as long as nothing has reached the consumer
//! yet. Once a real event has been yielded, the hard invariant takes over
//! and any further error is terminal.

use std::future::Future;
use std::pin::Pin;

use futures::stream::{self, StreamExt};
use rand::Rng;

use crate::error::{Error, ErrorCategory, Result};
use crate::stream::{ProviderStream, StreamEvent};

/// Configuration for the stream-level retry policy. Defaults match the
/// policy's documented defaults: a one-second base delay doubling up to a
/// one-minute ceiling, +/-20% jitter, five attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 5,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter_factor: 0.2,
        }
    }
}

/// Tracks whether a stream attempt has yielded any event yet. Once it has,
/// the retry policy must not be consulted again for that attempt — a
/// partially-streamed response can never be silently replaced by a retry.
#[derive(Debug, Default)]
pub struct RetryGuard {
    has_yielded: bool,
}

impl RetryGuard {
    pub fn new() -> Self {
        RetryGuard::default()
    }

    pub fn mark_yielded(&mut self) {
        self.has_yielded = true;
    }

    pub fn has_yielded(&self) -> bool {
        self.has_yielded
    }
}

/// Decide the delay before the next attempt, or `None` if retries are
/// exhausted or the category is not retryable. `retry_after_ms` is an
/// optional provider hint (e.g. a parsed `Retry-After` header); the actual
/// delay is `max(computed_backoff, retry_after_hint)`.
pub fn next_delay(config: &RetryConfig, category: ErrorCategory, attempt: u32, retry_after_ms: Option<u64>) -> Option<u64> {
    if !category.is_retryable() {
        return None;
    }
    if attempt >= config.max_retries {
        return None;
    }

    let computed = backoff_with_jitter(config, attempt);
    Some(match retry_after_ms {
        Some(hint) => computed.max(hint),
        None => computed,
    })
}

/// `delay_n = min(maxDelay, baseDelay * 2^n) * (1 +/- jitterFactor)`.
fn backoff_with_jitter(config: &RetryConfig, attempt: u32) -> u64 {
    let exp = config.base_delay_ms.saturating_mul(1u64 << attempt.min(20));
    let clamped = exp.min(config.max_delay_ms) as f64;
    let jitter = rand::thread_rng().gen_range(-config.jitter_factor..=config.jitter_factor);
    (clamped * (1.0 + jitter)).max(0.0).round() as u64
}

/// A factory that opens a fresh stream attempt. Provider adapters build one
/// closure per turn, capturing the request they want to (re)send.
pub type StreamFactory = Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<ProviderStream>> + Send>> + Send + Sync>;

struct RetryState {
    factory: StreamFactory,
    config: RetryConfig,
    attempt: u32,
    current: Option<ProviderStream>,
    guard: RetryGuard,
    done: bool,
}

/// Wrap `factory` so the returned stream retries itself: if opening a fresh
/// attempt fails, or the underlying stream's very first event is a
/// retryable `Error`, sleep for the backoff delay, emit a `Retry` event, and
/// try again — up to `config.max_retries` times. Once any other event has
/// reached the consumer, no further retry is attempted; a later `Error`
/// passes straight through.
pub fn with_retry(factory: StreamFactory, config: RetryConfig) -> ProviderStream {
    let state = RetryState {
        factory,
        config,
        attempt: 0,
        current: None,
        guard: RetryGuard::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if state.done {
                return None;
            }

            if state.current.is_none() {
                match (state.factory)().await {
                    Ok(s) => state.current = Some(s),
                    Err(err) => {
                        let category = err_category(&err);
                        match next_delay(&state.config, category, state.attempt, None) {
                            Some(delay) if !state.guard.has_yielded() => {
                                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                                state.attempt += 1;
                                let event = StreamEvent::Retry {
                                    attempt: state.attempt,
                                    max_retries: state.config.max_retries,
                                    delay_ms: delay,
                                    category,
                                    message: err.to_string(),
                                };
                                return Some((Ok(event), state));
                            }
                            _ => {
                                state.done = true;
                                return Some((Err(err), state));
                            }
                        }
                    }
                }
            }

            let mut current = state.current.take().expect("current stream just populated");
            match current.next().await {
                Some(Ok(StreamEvent::Error {
                    category,
                    message,
                    retry_after_ms,
                })) if !state.guard.has_yielded() => match next_delay(&state.config, category, state.attempt, retry_after_ms) {
                    Some(delay) => {
                        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                        state.attempt += 1;
                        let event = StreamEvent::Retry {
                            attempt: state.attempt,
                            max_retries: state.config.max_retries,
                            delay_ms: delay,
                            category,
                            message,
                        };
                        return Some((Ok(event), state));
                    }
                    None => {
                        state.done = true;
                        return Some((
                            Ok(StreamEvent::Error {
                                category,
                                message,
                                retry_after_ms,
                            }),
                            state,
                        ));
                    }
                },
                Some(Ok(event)) => {
                    state.guard.mark_yielded();
                    state.current = Some(current);
                    return Some((Ok(event), state));
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(err), state));
                }
                None => {
                    state.done = true;
                    return None;
                }
            }
        }
    }))
}

fn err_category(err: &Error) -> ErrorCategory {
    match err {
        Error::Stream(category, _) => *category,
        Error::Http(e) if e.is_timeout() => ErrorCategory::Timeout,
        Error::Http(_) => ErrorCategory::Transient5xx,
        _ => ErrorCategory::Other,
    }
}
