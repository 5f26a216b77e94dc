//! Consumes one provider stream for a single turn, accumulates its
//! content, applies the rebuild rule and missed-tool rescue, and emits
//! events as it goes. Checks the abort token before dispatching each
//! event so cancellation takes effect at the next event boundary rather
//! than mid-item.

use std::sync::Mutex;

use futures::StreamExt;

use crate::abort::AbortToken;
use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::stream::{ProviderStream, StreamEvent};
use crate::types::{AgentState, AssistantBlock, StopReason, Usage};

/// Accumulated state for one turn's stream, built up event by event.
#[derive(Debug, Default)]
struct StreamContext {
    text: String,
    thinking: String,
    completed_blocks: Vec<AssistantBlock>,
    usage: Option<Usage>,
}

impl StreamContext {
    /// Blocks streamed incrementally via `BlockCompleted`, independent of
    /// whatever `Done.message` ends up containing.
    fn streamed_blocks(&self) -> Vec<AssistantBlock> {
        self.completed_blocks.clone()
    }
}

/// Outcome of successfully draining a provider stream to its terminal event.
pub struct ProcessedTurn {
    pub blocks: Vec<AssistantBlock>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
}

/// Drains `stream` to completion, applying the rebuild rule: `Done`'s own
/// `message` wins outright whenever it is non-empty; the streamed blocks
/// are only used to reconstruct the turn when `Done` reports an empty
/// message. Either way, any `ToolUse` block present in `Done.message` but
/// missing from what was individually streamed is appended (never
/// reordered or dropped) — the missed-tool rescue.
pub async fn process_stream(
    mut stream: ProviderStream,
    turn: u32,
    sink: &EventSink,
    abort: &AbortToken,
    state: &Mutex<AgentState>,
) -> Result<ProcessedTurn> {
    let mut ctx = StreamContext::default();
    state.lock().unwrap().streaming_content.clear();

    loop {
        if abort.is_tripped() {
            return Err(Error::Aborted(ctx.text.clone()));
        }

        let next = stream.next().await;
        let event = match next {
            Some(event) => event?,
            None => return Err(Error::NoResponse),
        };

        match event {
            StreamEvent::TextDelta { delta } => {
                ctx.text.push_str(&delta);
                state.lock().unwrap().streaming_content = ctx.text.clone();
                sink.emit(Event::TextDelta { turn, delta });
            }
            StreamEvent::ThinkingDelta { delta } => {
                ctx.thinking.push_str(&delta);
                sink.emit(Event::ThinkingDelta { turn, delta });
            }
            StreamEvent::BlockCompleted { block } => {
                sink.emit(Event::AssistantBlockCompleted {
                    turn,
                    block: block.clone(),
                });
                ctx.completed_blocks.push(block);
            }
            StreamEvent::Usage { usage } => {
                ctx.usage = Some(usage);
                sink.emit(Event::UsageReported { turn, usage });
            }
            StreamEvent::Done {
                message,
                stop_reason,
                usage,
            } => {
                let blocks = rebuild(&ctx, message);
                return Ok(ProcessedTurn {
                    blocks,
                    stop_reason,
                    usage: usage.or(ctx.usage),
                });
            }
            StreamEvent::Error { category, message, .. } => {
                return Err(Error::stream(category, message));
            }
            StreamEvent::Retry {
                attempt,
                delay_ms,
                message,
                ..
            } => {
                sink.emit(Event::RetryAttempted {
                    turn,
                    attempt,
                    delay_ms,
                    reason: message,
                });
            }
        }
    }
}

fn rebuild(ctx: &StreamContext, done_message: Vec<AssistantBlock>) -> Vec<AssistantBlock> {
    let base = if done_message.is_empty() {
        ctx.streamed_blocks()
    } else {
        done_message.clone()
    };
    rescue_missed_tool_uses(base, &done_message)
}

/// Append any `ToolUse` block present in `done_message` but absent (by id)
/// from `base`, preserving `base`'s existing order and appending rescued
/// blocks in the order `done_message` lists them.
fn rescue_missed_tool_uses(mut base: Vec<AssistantBlock>, done_message: &[AssistantBlock]) -> Vec<AssistantBlock> {
    let present_ids: std::collections::HashSet<&str> = base.iter().filter_map(|b| b.tool_use_id()).collect();

    for block in done_message {
        if let AssistantBlock::ToolUse { id, .. } = block {
            if !present_ids.contains(id.as_str()) {
                base.push(block.clone());
            }
        }
    }
    base
}
