//! # Agent Runtime Core
//!
//! A streaming-first runtime core for building conversational, tool-using
//! LLM agents against local OpenAI-compatible servers such as LM Studio,
//! Ollama, llama.cpp, and vLLM.
//!
//! ## Key Features
//!
//! - **Streaming-first**: a closed [`StreamEvent`] vocabulary drives the
//!   turn loop, with the rebuild rule and missed-tool rescue reconciling
//!   incremental deltas against a provider's final message.
//! - **Tool calling**: register `Tool`/`CancellableTool` implementations
//!   with automatic JSON schema assembly via [`tools::ToolBuilder`].
//! - **Lifecycle hooks**: veto or modify tool calls before/after they run.
//! - **Cooperative cancellation**: an [`abort::AbortToken`] checked at
//!   every event boundary and tool dispatch.
//! - **Retry with a hard invariant**: exponential backoff with jitter,
//!   and a stream can never be silently retried once it has yielded a
//!   real event to the consumer.
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_core::{AgentOptions, Client};
//! use agent_core::providers::OpenAiCompatible;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = Box::new(OpenAiCompatible::new("http://localhost:1234/v1", "qwen2.5-32b-instruct"));
//!     let options = AgentOptions::builder().max_turns(10).build()?;
//!
//!     let client = Client::new("session-1", provider, options);
//!     let produced = client.run("What's the capital of France?").await?;
//!     for message in produced {
//!         println!("{message:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! For one-off prompts that need no conversation state, use [`query`].
//!
//! ## Architecture
//!
//! - **stream**: the [`Provider`] trait and [`StreamEvent`] vocabulary
//!   every adapter speaks; the core never depends on a transport crate.
//! - **stream_processor**: drains one turn's stream, applying the
//!   rebuild rule and missed-tool rescue.
//! - **retry**: exponential backoff with jitter, `Retry-After` handling,
//!   and the cannot-retry-once-yielded invariant.
//! - **turn**: the per-turn state machine — stream, dispatch tools
//!   sequentially, append results, re-check abort between calls.
//! - **client**: the multi-turn run loop and its mutators.
//! - **tools** / **hooks** / **executor**: tool registration, lifecycle
//!   hooks, and the pipeline that runs a tool call through both.
//! - **types**: messages, content, tool calls, and per-turn context.
//! - **config**: local-server presets and [`AgentOptions`].
//! - **context**: token estimation and history truncation helpers.
//! - **events** / **abort**: the event fan-out sink and cancellation token.
//! - **error**: the crate's `Error` enum and `Result` alias.
//! - **providers**: concrete `Provider` implementations (currently an
//!   OpenAI-compatible chat-completions adapter).

mod abort;
mod client;
mod config;
mod context;
mod error;
mod events;
mod executor;
mod hooks;
pub mod providers;
mod stream;
mod stream_processor;
mod tools;
mod turn;
mod types;

pub mod retry;

pub use abort::AbortToken;

pub use client::{query, Client};

pub use config::{AgentOptions, AgentOptionsBuilder, Provider as ProviderPreset};

pub use context::{estimate_tokens, is_approaching_limit, truncate_messages};

pub use error::{Error, ErrorCategory, Result};

pub use events::{Event, EventSink, EventSubscriber};

pub use hooks::{AggregatedOutcome, Hook, HookEngine, HookOutcome, HookPoint, PostToolUseEvent, PreToolUseEvent};

pub use stream::{Provider, ProviderStream, ProviderStreamOptions, StreamEvent};

pub use tools::{tool, CancellableTool, ExecutionMode, Tool, ToolBuilder, ToolRegistry};

pub use types::{
    AgentState, AssistantBlock, Content, ContentPart, Context, JsonObject, Message, StopReason, ToolCall, ToolDescriptor, ToolResult, Usage,
};

/// Convenience re-exports for typical usage: `use agent_core::prelude::*;`.
pub mod prelude {
    pub use crate::{
        AgentOptions, AssistantBlock, Client, Content, Error, Hook, HookOutcome, Message, Provider, Result, Tool, ToolBuilder, ToolResult,
        query, tool,
    };
}
