//! Closed event vocabulary emitted over the life of a run, and the
//! fan-out sink that delivers them to subscribers.
//!
//! A subscriber that panics or errors never affects the core loop: the
//! sink catches both and continues to the next subscriber.

use std::panic::AssertUnwindSafe;
use std::sync::Mutex;

use futures::FutureExt;

use crate::types::{AssistantBlock, StopReason, ToolCall, Usage};

/// Everything the core can report about a run. Variants are grouped by
/// lifecycle / streaming / tool, matching the three event categories.
#[derive(Debug, Clone)]
pub enum Event {
    // Lifecycle
    TurnStarted { turn: u32 },
    TurnEnded { turn: u32, stop_reason: StopReason },
    RunStarted,
    RunEnded,
    AgentInterrupted { partial_content: String },

    // Streaming
    TextDelta { turn: u32, delta: String },
    ThinkingDelta { turn: u32, delta: String },
    AssistantBlockCompleted { turn: u32, block: AssistantBlock },
    UsageReported { turn: u32, usage: Usage },
    RetryAttempted { turn: u32, attempt: u32, delay_ms: u64, reason: String },

    // Tool
    ToolCallStarted { turn: u32, call: ToolCall },
    ToolCallCompleted { turn: u32, call_id: String, is_error: bool, duration_ms: u64 },
    HookBlocked { turn: u32, tool_name: String, reason: String },
}

/// Receives events. Implementations should not block for long — the sink
/// calls every subscriber inline, on the turn loop's task.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventSubscriber for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Fan-out point for a run's events. Subscribers are registered once and
/// receive every event for the lifetime of the sink.
#[derive(Default)]
pub struct EventSink {
    subscribers: Mutex<Vec<Box<dyn EventSubscriber>>>,
}

impl EventSink {
    pub fn new() -> Self {
        EventSink {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, subscriber: Box<dyn EventSubscriber>) {
        self.subscribers.lock().unwrap().push(subscriber);
    }

    /// Deliver `event` to every subscriber. A subscriber panic is caught
    /// and logged; it never propagates and never stops delivery to the
    /// remaining subscribers.
    pub fn emit(&self, event: Event) {
        let subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.iter() {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| subscriber.on_event(&event)));
            if result.is_err() {
                log::error!("event subscriber panicked while handling {event:?}");
            }
        }
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.subscribers.lock().unwrap().len();
        f.debug_struct("EventSink").field("subscriber_count", &count).finish()
    }
}
