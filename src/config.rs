//! Local OpenAI-compatible server configuration. Covers the four
//! deployment targets a provider adapter most commonly needs to reach,
//! with environment-variable overrides for base URL and model name.

use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LMStudio,
    Ollama,
    LlamaCpp,
    VLLM,
}

impl Provider {
    /// The default base URL for this provider, or the value of its
    /// override environment variable if set.
    pub fn get_base_url(self) -> String {
        let (default, env_var) = match self {
            Provider::LMStudio => ("http://localhost:1234/v1", "LMSTUDIO_BASE_URL"),
            Provider::Ollama => ("http://localhost:11434/v1", "OLLAMA_BASE_URL"),
            Provider::LlamaCpp => ("http://localhost:8080/v1", "LLAMACPP_BASE_URL"),
            Provider::VLLM => ("http://localhost:8000/v1", "VLLM_BASE_URL"),
        };
        env::var(env_var).unwrap_or_else(|_| default.to_string())
    }

    /// The default model name for this provider, or the value of its
    /// override environment variable if set.
    pub fn get_model(self) -> String {
        let (default, env_var) = match self {
            Provider::LMStudio => ("local-model", "LMSTUDIO_MODEL"),
            Provider::Ollama => ("llama3", "OLLAMA_MODEL"),
            Provider::LlamaCpp => ("local-model", "LLAMACPP_MODEL"),
            Provider::VLLM => ("local-model", "VLLM_MODEL"),
        };
        env::var(env_var).unwrap_or_else(|_| default.to_string())
    }
}

/// Per-turn and per-run options exposed to callers. Mirrors the
/// configuration surface enumerated for provider stream requests, plus
/// the retry block used by [`crate::retry::RetryConfig`].
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub max_turns: u32,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub enable_thinking: bool,
    pub thinking_budget: Option<u32>,
    pub stop_sequences: Vec<String>,
    pub reasoning_effort: Option<String>,
    pub retry: crate::retry::RetryConfig,
}

impl AgentOptions {
    pub fn builder() -> AgentOptionsBuilder {
        AgentOptionsBuilder::new()
    }
}

impl Default for AgentOptions {
    fn default() -> Self {
        AgentOptions {
            max_turns: 100,
            max_tokens: None,
            temperature: None,
            enable_thinking: false,
            thinking_budget: None,
            stop_sequences: Vec::new(),
            reasoning_effort: None,
            retry: crate::retry::RetryConfig::default(),
        }
    }
}

#[derive(Debug, Default)]
pub struct AgentOptionsBuilder {
    options: AgentOptions,
}

impl AgentOptionsBuilder {
    pub fn new() -> Self {
        AgentOptionsBuilder::default()
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.options.max_turns = max_turns;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.options.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn enable_thinking(mut self, enable: bool) -> Self {
        self.options.enable_thinking = enable;
        self
    }

    pub fn thinking_budget(mut self, budget: u32) -> Self {
        self.options.thinking_budget = Some(budget);
        self
    }

    pub fn stop_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.options.stop_sequences.push(sequence.into());
        self
    }

    pub fn reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.options.reasoning_effort = Some(effort.into());
        self
    }

    pub fn retry(mut self, retry: crate::retry::RetryConfig) -> Self {
        self.options.retry = retry;
        self
    }

    /// Validates `max_turns > 0` before returning, per the config layer's
    /// job of rejecting obviously broken settings up front.
    pub fn build(self) -> crate::error::Result<AgentOptions> {
        if self.options.max_turns == 0 {
            return Err(crate::error::Error::config("max_turns must be greater than 0"));
        }
        Ok(self.options)
    }
}
