//! Tool execution: hook-gated invocation of one tool call, content
//! normalization, output truncation, and panic containment.

use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;

use crate::abort::AbortToken;
use crate::error::Result;
use crate::events::{Event, EventSink};
use crate::hooks::{AggregatedOutcome, HookEngine, PostToolUseEvent, PreToolUseEvent};
use crate::tools::ToolRegistry;
use crate::types::{Content, JsonObject, ToolCall, ToolResult};

/// Output content longer than this is truncated with a `"[truncated]"`
/// suffix before being stored in history.
const MAX_OUTPUT_CHARS: usize = 32_000;

pub struct ToolExecutor<'a> {
    pub registry: &'a ToolRegistry,
    pub hooks: &'a HookEngine,
    pub sink: &'a EventSink,
}

impl<'a> ToolExecutor<'a> {
    pub fn new(registry: &'a ToolRegistry, hooks: &'a HookEngine, sink: &'a EventSink) -> Self {
        ToolExecutor { registry, hooks, sink }
    }

    /// Execute one tool call:
    /// 1. Emit `ToolCallStarted`.
    /// 2. Run `PreToolUse` hooks; a `Block` short-circuits to an error
    ///    result without invoking the tool.
    /// 3. Apply any `Modify` outcome by shallow-merging into the call's
    ///    arguments.
    /// 4. Look up the tool in the registry; an unknown name is an error
    ///    result, not a crate-level `Error`.
    /// 5. Invoke the tool, capturing any panic as an error result.
    /// 6. Normalize the result's content (flatten, truncate).
    /// 7. Run `PostToolUse` hooks over the normalized result.
    /// 8. Emit `ToolCallCompleted`.
    /// 9. Return the final `ToolResult`.
    pub async fn execute(&self, turn: u32, call: ToolCall, abort: AbortToken) -> ToolResult {
        self.sink.emit(Event::ToolCallStarted {
            turn,
            call: call.clone(),
        });

        let pre_event = PreToolUseEvent {
            turn,
            call: call.clone(),
        };
        let mut call = call;

        match self.hooks.run_pre_tool_use(&pre_event).await {
            AggregatedOutcome::Block { reason } => {
                self.sink.emit(Event::HookBlocked {
                    turn,
                    tool_name: call.name.clone(),
                    reason: reason.clone(),
                });
                let result = ToolResult::error(format!("blocked by hook: {reason}"));
                self.finish(turn, &call.id, result, 0)
            }
            AggregatedOutcome::Modify(fields) => {
                shallow_merge(&mut call.arguments, fields);
                let (result, duration_ms) = self.invoke_and_normalize(&call, abort).await;
                let result = self.run_post_hooks(turn, &call, result, duration_ms).await;
                self.finish(turn, &call.id, result, duration_ms)
            }
            AggregatedOutcome::Allow => {
                let (result, duration_ms) = self.invoke_and_normalize(&call, abort).await;
                let result = self.run_post_hooks(turn, &call, result, duration_ms).await;
                self.finish(turn, &call.id, result, duration_ms)
            }
        }
    }

    async fn invoke_and_normalize(&self, call: &ToolCall, abort: AbortToken) -> (ToolResult, u64) {
        let Some(registered) = self.registry.get(&call.name) else {
            return (ToolResult::error(format!("unknown tool: {}", call.name)), 0);
        };

        let start = Instant::now();
        let invocation = AssertUnwindSafe(registered.invoke(call.arguments.clone(), abort)).catch_unwind();

        let outcome = match invocation.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => ToolResult::error(err.to_string()),
            Err(_) => {
                log::error!("tool '{}' panicked during invocation", call.name);
                ToolResult::error(format!("tool '{}' panicked", call.name))
            }
        };
        let elapsed = start.elapsed();
        log::debug!("tool '{}' finished in {:?}", call.name, elapsed);

        (normalize(outcome), elapsed.as_millis() as u64)
    }

    async fn run_post_hooks(&self, turn: u32, call: &ToolCall, result: ToolResult, duration_ms: u64) -> ToolResult {
        let event = PostToolUseEvent {
            turn,
            call: call.clone(),
            result: result.clone(),
            duration_ms,
        };
        match self.hooks.run_post_tool_use(&event).await {
            AggregatedOutcome::Allow => result,
            AggregatedOutcome::Modify(fields) => {
                let mut result = result;
                shallow_merge(&mut result.details, fields);
                result
            }
            AggregatedOutcome::Block { reason } => ToolResult::error(format!("blocked by hook: {reason}")),
        }
    }

    fn finish(&self, turn: u32, call_id: &str, result: ToolResult, duration_ms: u64) -> ToolResult {
        self.sink.emit(Event::ToolCallCompleted {
            turn,
            call_id: call_id.to_string(),
            is_error: result.is_error,
            duration_ms,
        });
        result
    }
}

fn shallow_merge(target: &mut JsonObject, source: JsonObject) {
    for (key, value) in source {
        target.insert(key, value);
    }
}

/// Flatten multi-part content to a string and truncate it if it exceeds
/// [`MAX_OUTPUT_CHARS`].
fn normalize(mut result: ToolResult) -> ToolResult {
    let flat = result.content.as_flat_text();
    if flat.chars().count() > MAX_OUTPUT_CHARS {
        let truncated: String = flat.chars().take(MAX_OUTPUT_CHARS).collect();
        result.content = Content::text(format!("{truncated}[truncated]"));
    } else {
        result.content = Content::text(flat);
    }
    result
}
