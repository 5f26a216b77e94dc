//! # Error Types for the Agent Runtime Core
//!
//! This module defines all error types used throughout the core, providing
//! comprehensive error handling with detailed context for different failure
//! scenarios.
//!
//! ## Design Philosophy
//!
//! - **Explicit Error Handling**: Uses Rust's `Result<T>` type for all fallible operations
//! - **No Silent Failures**: Stream-layer errors are always propagated explicitly
//! - **Rich Context**: Each error variant provides specific information about what went wrong
//! - **Easy Conversion**: Automatic conversion from common error types (reqwest, serde_json)
//!
//! Tool-layer failures are intentionally NOT represented here: per the turn
//! loop's error handling design, a failing tool is normalized into an
//! `isError=true` `ToolResult` and never surfaces as an `Error`. This enum
//! only covers failures that legitimately abort a turn or a run.

use thiserror::Error;

// ============================================================================
// TYPE ALIASES
// ============================================================================

/// Type alias for `Result<T, Error>` used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// ERROR CATEGORY
// ============================================================================

/// Closed classification of stream/provider failures, per the retry policy's
/// error taxonomy. Retryable: `RateLimit`, `Timeout`, `Transient5xx`.
/// Non-retryable: `Auth`, `Validation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    RateLimit,
    Timeout,
    Transient5xx,
    Auth,
    Validation,
    Other,
}

impl ErrorCategory {
    /// Whether the retry policy should attempt another stream for this category.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit | ErrorCategory::Timeout | ErrorCategory::Transient5xx
        )
    }

    /// The message prefix used when surfacing this category to a caller, e.g. `"rate_limit"`.
    pub fn prefix(self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Transient5xx => "server_error",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Other => "error",
        }
    }
}

// ============================================================================
// ERROR ENUM
// ============================================================================

/// Comprehensive error type covering all failure modes in the core runtime.
///
/// Uses `thiserror` to implement `std::error::Error` and provide
/// well-formatted error messages.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed. Wraps `reqwest::Error`; produced by provider
    /// adapters (e.g. `providers::OpenAiCompatible`), never by the core
    /// turn loop directly.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration provided when building `AgentOptions`.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A provider stream ended in an error after it had already yielded
    /// events, or after retries were exhausted. Carries the classified
    /// category so callers can prefix messages per the error handling design.
    #[error("{}: {1}", .0.prefix())]
    Stream(ErrorCategory, String),

    /// The retry policy exhausted `maxRetries` without a successful stream.
    #[error("max retries exceeded: {0}")]
    MaxRetriesExceeded(String),

    /// A provider stream ended without ever emitting `Done` or `Error`.
    #[error("stream ended without a terminal event")]
    NoResponse,

    /// A turn was requested while one was already in flight.
    #[error("a turn is already in progress")]
    AgentBusy,

    /// A mutator (`registerTool`, `registerHook`, `switchModel`,
    /// `setReasoningLevel`, `clearMessages`) was called while a turn was
    /// running.
    #[error("cannot mutate agent state while a turn is running")]
    MutationWhileRunning,

    /// Cooperative cancellation: the `AbortToken` was tripped mid-turn.
    /// Carries whatever text had streamed in before the trip, for forensics
    /// (mirrors `AgentState::streaming_content`).
    #[error("aborted")]
    Aborted(String),

    /// Invalid input provided by the caller (e.g. empty prompt).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Miscellaneous error that doesn't fit other categories.
    #[error("Error: {0}")]
    Other(String),
}

// ============================================================================
// CONVENIENCE CONSTRUCTORS
// ============================================================================

impl Error {
    /// Create a new configuration error with a descriptive message.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a classified stream error.
    pub fn stream(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Error::Stream(category, msg.into())
    }

    /// Create a new invalid input error for caller input validation failures.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create a new miscellaneous error for cases that don't fit other categories.
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

// ============================================================================
// TESTS
// ============================================================================
