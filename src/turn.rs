//! The turn state machine: one call into the provider, stream processing,
//! and — if the model asked for tools — strictly sequential dispatch of
//! each tool call with an abort re-check between calls.

use std::sync::Mutex;

use crate::abort::AbortToken;
use crate::error::{Error, Result};
use crate::events::{Event, EventSink};
use crate::executor::ToolExecutor;
use crate::hooks::HookEngine;
use crate::stream::{Provider, ProviderStreamOptions};
use crate::stream_processor::process_stream;
use crate::tools::ToolRegistry;
use crate::types::{AgentState, AssistantBlock, Content, Context, Message, StopReason, ToolCall, Usage};

pub struct TurnRunner<'a> {
    pub provider: &'a dyn Provider,
    pub registry: &'a ToolRegistry,
    pub hooks: &'a HookEngine,
    pub sink: &'a EventSink,
    pub state: &'a Mutex<AgentState>,
}

/// Result of running one turn. When `interrupted` is `true` the turn did
/// not run to completion: `messages` holds whatever was already appended
/// (the assistant message and any tool results executed before the abort
/// took effect, per I2), `stop_reason`/`usage` reflect what the stream
/// reported if it reached `Done` at all, and `partial_content` carries the
/// streamed text accumulated before an abort that struck mid-stream
/// (before any assistant message existed to hold it).
pub struct TurnOutcome {
    pub messages: Vec<Message>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
    pub interrupted: bool,
    pub partial_content: Option<String>,
}

impl<'a> TurnRunner<'a> {
    pub fn new(
        provider: &'a dyn Provider,
        registry: &'a ToolRegistry,
        hooks: &'a HookEngine,
        sink: &'a EventSink,
        state: &'a Mutex<AgentState>,
    ) -> Self {
        TurnRunner {
            provider,
            registry,
            hooks,
            sink,
            state,
        }
    }

    /// Run one turn: open a provider stream over `context`, process it to
    /// a terminal assistant message, and — if it requested tools — invoke
    /// each tool call in order, appending a `ToolResult` message per call.
    /// Returns every message produced by this turn (the assistant message,
    /// plus one `ToolResult` message per tool call actually invoked).
    pub async fn execute(
        &self,
        turn: u32,
        context: &Context,
        options: &ProviderStreamOptions,
        abort: &AbortToken,
    ) -> Result<TurnOutcome> {
        self.sink.emit(Event::TurnStarted { turn });

        let stream = self.provider.stream(context, options).await?;
        let processed = match process_stream(stream, turn, self.sink, abort, self.state).await {
            Ok(processed) => processed,
            // Aborted before `Done` ever arrived: no assistant message to
            // build, so there is nothing to append to history. Per §4.7,
            // interrupted turns do not emit `TurnEnded`.
            Err(Error::Aborted(partial)) => {
                return Ok(TurnOutcome {
                    messages: vec![],
                    stop_reason: StopReason::EndTurn,
                    usage: None,
                    interrupted: true,
                    partial_content: Some(partial),
                });
            }
            Err(err) => return Err(err),
        };

        let assistant_message = Message::Assistant {
            content: processed.blocks.clone(),
            usage: processed.usage,
            stop_reason: Some(processed.stop_reason),
        };

        let mut messages = vec![assistant_message];

        if processed.stop_reason == StopReason::ToolUse {
            let tool_calls = extract_tool_calls(&processed.blocks);
            let executor = ToolExecutor::new(self.registry, self.hooks, self.sink);

            for (i, call) in tool_calls.iter().enumerate() {
                if abort.is_tripped() {
                    synthesize_aborted_results(&mut messages, &tool_calls[i..]);
                    return Ok(TurnOutcome {
                        messages,
                        stop_reason: processed.stop_reason,
                        usage: processed.usage,
                        interrupted: true,
                        partial_content: None,
                    });
                }

                // I5: `active_tool` is non-null for exactly the window from
                // invocation start through PostHooks, both of which
                // `executor.execute` runs before returning.
                self.state.lock().unwrap().active_tool = Some(call.name.clone());
                let child = abort.child();
                let result = executor.execute(turn, call.clone(), child).await;
                self.state.lock().unwrap().active_tool = None;
                let tool_interrupted = result.was_interrupted();
                messages.push(Message::tool_result(call.id.clone(), result.content.clone(), result.is_error));

                if tool_interrupted || abort.is_tripped() {
                    synthesize_aborted_results(&mut messages, &tool_calls[i + 1..]);
                    return Ok(TurnOutcome {
                        messages,
                        stop_reason: processed.stop_reason,
                        usage: processed.usage,
                        interrupted: true,
                        partial_content: None,
                    });
                }
            }
        }

        self.sink.emit(Event::TurnEnded {
            turn,
            stop_reason: processed.stop_reason,
        });

        Ok(TurnOutcome {
            messages,
            stop_reason: processed.stop_reason,
            usage: processed.usage,
            interrupted: false,
            partial_content: None,
        })
    }
}

/// I2b: a `ToolUse` that never ran because the turn was interrupted first
/// is retained with a synthetic error `ToolResult`, never silently dropped.
fn synthesize_aborted_results(messages: &mut Vec<Message>, remaining: &[ToolCall]) {
    for call in remaining {
        messages.push(Message::tool_result(
            call.id.clone(),
            Content::text("aborted before execution"),
            true,
        ));
    }
}

fn extract_tool_calls(blocks: &[AssistantBlock]) -> Vec<crate::types::ToolCall> {
    blocks
        .iter()
        .filter_map(|b| match b {
            AssistantBlock::ToolUse { id, name, arguments } => Some(crate::types::ToolCall {
                id: id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            }),
            _ => None,
        })
        .collect()
}
