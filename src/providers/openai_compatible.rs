//! A [`Provider`] speaking the OpenAI-compatible chat-completions streaming
//! API used by LM Studio, Ollama, llama.cpp, and vLLM. This is the crate's
//! only concrete HTTP/SSE adapter — the core turn loop never depends on
//! `reqwest` or `eventsource_stream` directly, only on the `Provider` trait
//! in `stream.rs`.

use std::pin::Pin;

use async_trait::async_trait;
use base64::Engine;
use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use serde_json::{json, Map, Value};

use crate::error::{Error, ErrorCategory, Result};
use crate::retry::{with_retry, RetryConfig, StreamFactory};
use crate::stream::{Provider, ProviderStream, ProviderStreamOptions, StreamEvent};
use crate::types::{AssistantBlock, Content, ContentPart, Context, JsonObject, Message, StopReason, Usage};

/// Speaks the `/chat/completions` streaming endpoint common to local
/// OpenAI-compatible servers. `base_url` should include the API version
/// segment (e.g. `http://localhost:1234/v1`).
pub struct OpenAiCompatible {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl OpenAiCompatible {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiCompatible {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Provider for OpenAiCompatible {
    async fn stream(&self, context: &Context, options: &ProviderStreamOptions) -> Result<ProviderStream> {
        let body = build_request_body(&self.model, context, options);
        let http = self.http.clone();
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let api_key = self.api_key.clone();

        let factory: StreamFactory = Box::new(move || {
            let http = http.clone();
            let url = url.clone();
            let api_key = api_key.clone();
            let body = body.clone();
            Box::pin(async move { open_stream_once(http, url, api_key, body).await })
        });

        Ok(with_retry(factory, self.retry))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

async fn open_stream_once(http: reqwest::Client, url: String, api_key: Option<String>, body: Value) -> Result<ProviderStream> {
    let mut request = http.post(&url).json(&body);
    if let Some(key) = &api_key {
        request = request.bearer_auth(key);
    }

    let response = request.send().await?;
    let status = response.status();

    if !status.is_success() {
        let retry_after_ms = parse_retry_after(response.headers());
        let category = classify_status(status.as_u16());
        let body_text = response.text().await.unwrap_or_default();
        let message = format!("HTTP {status}: {body_text}");
        log::warn!("provider request failed: {message}");
        return Ok(Box::pin(stream::once(async move {
            Ok(StreamEvent::Error {
                category,
                message,
                retry_after_ms,
            })
        })));
    }

    let events = response.bytes_stream().eventsource();
    Ok(Box::pin(ChunkDecoder {
        events: Box::pin(events),
        accumulated_text: String::new(),
        accumulated_thinking: String::new(),
        tool_calls: Vec::new(),
        usage: None,
        done: false,
    }))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    // Only the integer-seconds form is supported; an HTTP-date value (rare
    // on local OpenAI-compatible servers) is treated as "no hint" rather
    // than guessed at without a date-parsing dependency.
    value.trim().parse::<u64>().ok().map(|seconds| seconds * 1000)
}

fn classify_status(status: u16) -> ErrorCategory {
    match status {
        429 => ErrorCategory::RateLimit,
        401 | 403 => ErrorCategory::Auth,
        400 | 404 | 422 => ErrorCategory::Validation,
        408 | 504 => ErrorCategory::Timeout,
        500..=599 => ErrorCategory::Transient5xx,
        _ => ErrorCategory::Other,
    }
}

// ============================================================================
// SSE CHUNK DECODING
// ============================================================================

#[derive(Debug, Default, Clone)]
struct AccumulatedToolCall {
    id: String,
    name: String,
    arguments_json: String,
}

type EventStream = Pin<Box<dyn Stream<Item = std::result::Result<eventsource_stream::Event, eventsource_stream::EventStreamError<reqwest::Error>>> + Send>>;

/// Adapts one provider-compatible SSE response into our `StreamEvent`
/// vocabulary. Tool-call argument fragments are accumulated silently across
/// chunks (this adapter's wire format has no per-fragment UI event) and
/// surfaced as completed `ToolUse` blocks once `finish_reason` arrives.
struct ChunkDecoder {
    events: EventStream,
    accumulated_text: String,
    accumulated_thinking: String,
    tool_calls: Vec<AccumulatedToolCall>,
    usage: Option<Usage>,
    done: bool,
}

impl Stream for ChunkDecoder {
    type Item = Result<StreamEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        use std::task::Poll;

        if self.done {
            return Poll::Ready(None);
        }

        loop {
            let next = self.events.as_mut().poll_next(cx);
            let event = match next {
                Poll::Ready(Some(Ok(event))) => event,
                Poll::Ready(Some(Err(err))) => {
                    self.done = true;
                    return Poll::Ready(Some(Err(Error::other(err.to_string()))));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            };

            if event.data == "[DONE]" {
                self.done = true;
                return Poll::Ready(Some(Ok(self.finish(StopReason::EndTurn))));
            }

            let chunk: Value = match serde_json::from_str(&event.data) {
                Ok(v) => v,
                Err(err) => {
                    log::warn!("skipping malformed SSE chunk: {err}");
                    continue;
                }
            };

            if let Some(usage) = chunk.get("usage").and_then(parse_usage) {
                self.usage = Some(usage);
            }

            let Some(choice) = chunk.get("choices").and_then(|c| c.as_array()).and_then(|c| c.first()) else {
                continue;
            };

            if let Some(delta) = choice.get("delta") {
                if let Some(text) = delta.get("content").and_then(Value::as_str) {
                    if !text.is_empty() {
                        self.accumulated_text.push_str(text);
                        return Poll::Ready(Some(Ok(StreamEvent::TextDelta { delta: text.to_string() })));
                    }
                }
                if let Some(text) = delta.get("reasoning_content").and_then(Value::as_str) {
                    if !text.is_empty() {
                        self.accumulated_thinking.push_str(text);
                        return Poll::Ready(Some(Ok(StreamEvent::ThinkingDelta { delta: text.to_string() })));
                    }
                }
                if let Some(deltas) = delta.get("tool_calls").and_then(Value::as_array) {
                    for d in deltas {
                        self.apply_tool_call_delta(d);
                    }
                }
            }

            if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
                let stop_reason = match reason {
                    "tool_calls" => StopReason::ToolUse,
                    "length" => StopReason::MaxTokens,
                    "stop" => StopReason::EndTurn,
                    "content_filter" => StopReason::Error,
                    _ => StopReason::EndTurn,
                };
                self.done = true;
                return Poll::Ready(Some(Ok(self.finish(stop_reason))));
            }
        }
    }
}

impl ChunkDecoder {
    fn apply_tool_call_delta(&mut self, delta: &Value) {
        let index = delta.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
        while self.tool_calls.len() <= index {
            self.tool_calls.push(AccumulatedToolCall::default());
        }
        let entry = &mut self.tool_calls[index];

        if let Some(id) = delta.get("id").and_then(Value::as_str) {
            entry.id = id.to_string();
        }
        if let Some(function) = delta.get("function") {
            if let Some(name) = function.get("name").and_then(Value::as_str) {
                entry.name.push_str(name);
            }
            if let Some(args) = function.get("arguments").and_then(Value::as_str) {
                entry.arguments_json.push_str(args);
            }
        }
    }

    fn finish(&mut self, stop_reason: StopReason) -> StreamEvent {
        let mut blocks = Vec::new();
        if !self.accumulated_thinking.is_empty() {
            blocks.push(AssistantBlock::Thinking(std::mem::take(&mut self.accumulated_thinking)));
        }
        if !self.accumulated_text.is_empty() {
            blocks.push(AssistantBlock::Text(std::mem::take(&mut self.accumulated_text)));
        }
        for (i, call) in self.tool_calls.drain(..).enumerate() {
            let arguments: JsonObject = serde_json::from_str(&call.arguments_json).unwrap_or_else(|_| Map::new());
            let id = if call.id.is_empty() { format!("call_{i}") } else { call.id };
            blocks.push(AssistantBlock::ToolUse {
                id,
                name: call.name,
                arguments,
            });
        }

        StreamEvent::Done {
            message: blocks,
            stop_reason,
            usage: self.usage.take(),
        }
    }
}

fn parse_usage(usage: &Value) -> Option<Usage> {
    Some(Usage {
        input_tokens: usage.get("prompt_tokens")?.as_u64()?,
        output_tokens: usage.get("completion_tokens")?.as_u64()?,
        cache_creation_tokens: None,
        cache_read_tokens: usage
            .get("prompt_tokens_details")
            .and_then(|d| d.get("cached_tokens"))
            .and_then(Value::as_u64),
    })
}

// ============================================================================
// REQUEST BUILDING
// ============================================================================

fn build_request_body(model: &str, context: &Context, options: &ProviderStreamOptions) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = &context.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.extend(context.messages.iter().map(message_to_json));

    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("messages".to_string(), Value::Array(messages));
    body.insert("stream".to_string(), json!(true));
    body.insert("stream_options".to_string(), json!({ "include_usage": true }));

    if let Some(max_tokens) = options.max_tokens {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = options.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if !options.stop_sequences.is_empty() {
        body.insert("stop".to_string(), json!(options.stop_sequences));
    }
    if let Some(effort) = &options.reasoning_effort {
        body.insert("reasoning_effort".to_string(), json!(effort));
    }
    if !context.tools.is_empty() {
        let tools: Vec<Value> = context
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters_schema,
                    }
                })
            })
            .collect();
        body.insert("tools".to_string(), Value::Array(tools));
        body.insert("tool_choice".to_string(), json!("auto"));
    }

    Value::Object(body)
}

fn message_to_json(message: &Message) -> Value {
    match message {
        Message::User { content } => json!({ "role": "user", "content": content_to_json(content) }),
        Message::Assistant { content, .. } => {
            let text: String = content
                .iter()
                .filter_map(|b| match b {
                    AssistantBlock::Text(t) => Some(t.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("");
            let tool_calls: Vec<Value> = content
                .iter()
                .filter_map(|b| match b {
                    AssistantBlock::ToolUse { id, name, arguments } => Some(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": serde_json::to_string(arguments).unwrap_or_default(),
                        }
                    })),
                    _ => None,
                })
                .collect();

            let mut obj = Map::new();
            obj.insert("role".to_string(), json!("assistant"));
            obj.insert("content".to_string(), json!(text));
            if !tool_calls.is_empty() {
                obj.insert("tool_calls".to_string(), Value::Array(tool_calls));
            }
            Value::Object(obj)
        }
        Message::ToolResult {
            tool_call_id,
            content,
            is_error: _,
        } => json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content.as_flat_text(),
        }),
    }
}

fn content_to_json(content: &Content) -> Value {
    match content {
        Content::Text(text) => json!(text),
        Content::Parts(parts) => {
            let array: Vec<Value> = parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text { text } => json!({ "type": "text", "text": text }),
                    ContentPart::Image { media_type, data } => {
                        if base64::engine::general_purpose::STANDARD.decode(data).is_err() {
                            log::warn!("image content part did not contain valid base64 data");
                        }
                        json!({
                            "type": "image_url",
                            "image_url": { "url": format!("data:{media_type};base64,{data}") }
                        })
                    }
                })
                .collect();
            Value::Array(array)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToolDescriptor;

    #[test]
    fn request_body_includes_system_prompt_and_tools() {
        let context = Context {
            messages: vec![Message::user("hi")],
            system_prompt: Some("be terse".into()),
            tools: vec![ToolDescriptor {
                name: "add".into(),
                description: "adds numbers".into(),
                parameters_schema: Map::new(),
            }],
        };
        let body = build_request_body("local-model", &context, &ProviderStreamOptions::default());
        assert_eq!(body["model"], "local-model");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["tools"][0]["function"]["name"], "add");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn assistant_message_round_trips_tool_calls() {
        let msg = Message::assistant(vec![
            AssistantBlock::Text("checking".into()),
            AssistantBlock::ToolUse {
                id: "call_1".into(),
                name: "add".into(),
                arguments: Map::new(),
            },
        ]);
        let json = message_to_json(&msg);
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["tool_calls"][0]["id"], "call_1");
    }

    #[test]
    fn classify_status_maps_common_codes() {
        assert_eq!(classify_status(429), ErrorCategory::RateLimit);
        assert_eq!(classify_status(401), ErrorCategory::Auth);
        assert_eq!(classify_status(500), ErrorCategory::Transient5xx);
        assert_eq!(classify_status(400), ErrorCategory::Validation);
    }

    #[test]
    fn parse_usage_reads_prompt_and_completion_tokens() {
        let usage = json!({ "prompt_tokens": 10, "completion_tokens": 5 });
        let parsed = parse_usage(&usage).unwrap();
        assert_eq!(parsed.input_tokens, 10);
        assert_eq!(parsed.output_tokens, 5);
    }

    #[tokio::test]
    async fn tool_call_deltas_accumulate_into_a_single_block() {
        let mut decoder = ChunkDecoder {
            events: Box::pin(futures::stream::empty()),
            accumulated_text: String::new(),
            accumulated_thinking: String::new(),
            tool_calls: Vec::new(),
            usage: None,
            done: false,
        };
        decoder.apply_tool_call_delta(&json!({ "index": 0, "id": "call_1", "function": { "name": "add", "arguments": "{\"a\":" } }));
        decoder.apply_tool_call_delta(&json!({ "index": 0, "function": { "arguments": "1}" } }));

        let event = decoder.finish(StopReason::ToolUse);
        match event {
            StreamEvent::Done { message, .. } => {
                assert_eq!(message.len(), 1);
                assert!(matches!(&message[0], AssistantBlock::ToolUse { name, .. } if name == "add"));
            }
            _ => panic!("expected Done"),
        }
    }
}
