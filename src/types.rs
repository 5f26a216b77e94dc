//! Core type definitions for messages, content, tool calls, and per-turn context.
//!
//! Messages are immutable once inserted into history: nothing here exposes a
//! `&mut` into a stored `Message`'s content after construction.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type JsonObject = Map<String, Value>;

// ============================================================================
// CONTENT
// ============================================================================

/// A single content part within a [`Content::Parts`] sequence. Order is
/// semantically preserved — callers must not resort or deduplicate these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { media_type: String, data: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(media_type: impl Into<String>, base64_data: impl Into<String>) -> Self {
        ContentPart::Image {
            media_type: media_type.into(),
            data: base64_data.into(),
        }
    }
}

/// Message content: either a plain string or an ordered sequence of parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Content {
    pub fn text(s: impl Into<String>) -> Self {
        Content::Text(s.into())
    }

    /// Normalize to a flat string for history storage / logging, matching
    /// the tool-executor's content normalization rule: join text parts with
    /// `"\n"`, replace images with `"[image]"`.
    pub fn as_flat_text(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Parts(parts) => parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => text.clone(),
                    ContentPart::Image { .. } => "[image]".to_string(),
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Content::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Text(s)
    }
}

// ============================================================================
// ASSISTANT BLOCK
// ============================================================================

/// One block within an `Assistant` message's content. Order within the
/// message is preserved exactly as produced by the stream processor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantBlock {
    Text(String),
    Thinking(String),
    ToolUse {
        id: String,
        name: String,
        arguments: JsonObject,
    },
}

impl AssistantBlock {
    pub fn is_tool_use(&self) -> bool {
        matches!(self, AssistantBlock::ToolUse { .. })
    }

    pub fn tool_use_id(&self) -> Option<&str> {
        match self {
            AssistantBlock::ToolUse { id, .. } => Some(id),
            _ => None,
        }
    }
}

// ============================================================================
// STOP REASON / USAGE
// ============================================================================

/// Closed set of reasons a provider stream terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
    Error,
}

/// Token usage for one provider response. All fields non-negative.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_tokens: Option<u64>,
    pub cache_read_tokens: Option<u64>,
}

impl Usage {
    /// Combine two usages, summing counts and the optional cache fields.
    pub fn add(&self, other: &Usage) -> Usage {
        Usage {
            input_tokens: self.input_tokens + other.input_tokens,
            output_tokens: self.output_tokens + other.output_tokens,
            cache_creation_tokens: add_opt(self.cache_creation_tokens, other.cache_creation_tokens),
            cache_read_tokens: add_opt(self.cache_read_tokens, other.cache_read_tokens),
        }
    }
}

fn add_opt(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

// ============================================================================
// TOOL CALL
// ============================================================================

/// A tool invocation requested by the model. `id` is provider-assigned and
/// globally unique within a turn; `ToolResult` messages reference it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: JsonObject,
}

// ============================================================================
// MESSAGE
// ============================================================================

/// One message in the conversation history. Messages are never mutated
/// after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: Content,
    },
    Assistant {
        content: Vec<AssistantBlock>,
        usage: Option<Usage>,
        stop_reason: Option<StopReason>,
    },
    ToolResult {
        tool_call_id: String,
        content: Content,
        is_error: bool,
    },
}

impl Message {
    pub fn user(content: impl Into<Content>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: Vec<AssistantBlock>) -> Self {
        Message::Assistant {
            content,
            usage: None,
            stop_reason: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<Content>, is_error: bool) -> Self {
        Message::ToolResult {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
        }
    }

    /// `ToolCall`s carried by this message, if it is an `Assistant` message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match self {
            Message::Assistant { content, .. } => content
                .iter()
                .filter_map(|b| match b {
                    AssistantBlock::ToolUse { id, name, arguments } => Some(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: arguments.clone(),
                    }),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// TOOL DESCRIPTOR / CONTEXT
// ============================================================================

/// Static metadata for one registered tool, plus an opaque invocation handle.
/// The handle is looked up through the `ToolRegistry`, not stored inline,
/// so `ToolDescriptor` stays `Clone`/`Serialize` for building provider requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: JsonObject,
}

/// Immutable per-turn context handed to the provider.
#[derive(Debug, Clone)]
pub struct Context {
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolDescriptor>,
}

// ============================================================================
// TOOL RESULT (tool output, before normalization into a message)
// ============================================================================

/// The raw result a `Tool`/`CancellableTool` implementation returns, before
/// the executor normalizes it into a `Message::ToolResult`.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub content: Content,
    pub is_error: bool,
    pub details: JsonObject,
    pub stop_turn: bool,
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

impl ToolResult {
    pub fn success(content: impl Into<Content>) -> Self {
        ToolResult {
            content: content.into(),
            is_error: false,
            details: JsonObject::new(),
            stop_turn: false,
        }
    }

    pub fn error(content: impl Into<Content>) -> Self {
        ToolResult {
            content: content.into(),
            is_error: true,
            details: JsonObject::new(),
            stop_turn: false,
        }
    }

    /// Per §5: a tool voluntarily reporting cooperative cancellation.
    pub fn interrupted() -> Self {
        let mut details = JsonObject::new();
        details.insert("interrupted".to_string(), Value::Bool(true));
        ToolResult {
            content: Content::text("interrupted"),
            is_error: true,
            details,
            stop_turn: false,
        }
    }

    pub fn was_interrupted(&self) -> bool {
        self.details.get("interrupted").and_then(Value::as_bool).unwrap_or(false)
    }
}

// ============================================================================
// AGENT STATE
// ============================================================================

/// Snapshot-friendly run state. `streaming_content` accumulates
/// post-last-checkpoint text for interrupt forensics.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub current_turn: u32,
    pub token_usage_totals: Usage,
    pub is_running: bool,
    pub active_tool: Option<String>,
    pub streaming_content: String,
}

impl AgentState {
    pub fn new(session_id: impl Into<String>) -> Self {
        AgentState {
            session_id: session_id.into(),
            ..Default::default()
        }
    }
}
