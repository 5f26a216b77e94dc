//! The provider contract: a closed vocabulary of streaming events plus the
//! trait boundary a concrete HTTP/SSE client implements. The core turn
//! loop depends only on this module, never on any transport crate.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::{ErrorCategory, Result};
use crate::types::{AssistantBlock, Context, StopReason, Usage};

/// One event emitted by a provider stream, in emission order.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Incremental text content.
    TextDelta { delta: String },
    /// Incremental reasoning/thinking content.
    ThinkingDelta { delta: String },
    /// A content block (text, thinking, or tool use) has finished streaming.
    BlockCompleted { block: AssistantBlock },
    /// Token accounting for this response, if the provider reports it
    /// before `Done`.
    Usage { usage: Usage },
    /// Terminal success event. `message` is the provider's own
    /// reconstruction of the full assistant turn; per the rebuild rule,
    /// it is authoritative whenever non-empty.
    Done {
        message: Vec<AssistantBlock>,
        stop_reason: StopReason,
        usage: Option<Usage>,
    },
    /// Terminal failure event.
    Error {
        category: ErrorCategory,
        message: String,
        /// A `Retry-After` hint parsed from the provider's response, if any.
        retry_after_ms: Option<u64>,
    },
    /// A provider-internal retry is about to happen. Purely informational —
    /// the stream keeps running; `StreamProcessor` surfaces this as
    /// `Event::RetryAttempted` and continues consuming.
    Retry {
        attempt: u32,
        max_retries: u32,
        delay_ms: u64,
        category: ErrorCategory,
        message: String,
    },
}

/// Options passed to a provider when opening a stream for one turn.
#[derive(Debug, Clone)]
pub struct ProviderStreamOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub enable_thinking: bool,
    pub thinking_budget: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub reasoning_effort: Option<String>,
}

impl Default for ProviderStreamOptions {
    fn default() -> Self {
        ProviderStreamOptions {
            max_tokens: None,
            temperature: None,
            enable_thinking: false,
            thinking_budget: None,
            stop_sequences: Vec::new(),
            reasoning_effort: None,
        }
    }
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The boundary every provider adapter implements. The core never knows
/// whether the underlying transport is HTTP/SSE, a local process, or a
/// test fixture.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Open a stream for one turn over the given context. The returned
    /// stream must emit events in order and terminate with exactly one of
    /// `Done` or `Error`.
    async fn stream(&self, context: &Context, options: &ProviderStreamOptions) -> Result<ProviderStream>;

    /// A stable identifier for logging/events (e.g. the model name).
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    struct ScriptedProvider {
        events: Vec<StreamEvent>,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn stream(&self, _context: &Context, _options: &ProviderStreamOptions) -> Result<ProviderStream> {
            let events: Vec<Result<StreamEvent>> = self.events.iter().cloned().map(Ok).collect();
            Ok(Box::pin(stream::iter(events)))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn scripted_provider_replays_events_in_order() {
        use futures::StreamExt;

        let provider = ScriptedProvider {
            events: vec![
                StreamEvent::TextDelta { delta: "hi".into() },
                StreamEvent::Done {
                    message: vec![],
                    stop_reason: StopReason::EndTurn,
                    usage: None,
                },
            ],
        };
        let ctx = Context {
            messages: vec![],
            system_prompt: None,
            tools: vec![],
        };
        let mut s = provider.stream(&ctx, &ProviderStreamOptions::default()).await.unwrap();
        let first = s.next().await.unwrap().unwrap();
        assert!(matches!(first, StreamEvent::TextDelta { .. }));
        let second = s.next().await.unwrap().unwrap();
        assert!(matches!(second, StreamEvent::Done { .. }));
        assert!(s.next().await.is_none());
    }
}
