//! Hook points around tool execution. Hooks observe and may veto or
//! modify a tool call before/after it runs; a hook that panics degrades
//! to `Allow` rather than aborting the turn.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::{Map, Value};

use crate::types::{JsonObject, ToolCall, ToolResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    PreToolUse,
    PostToolUse,
}

#[derive(Debug, Clone)]
pub struct PreToolUseEvent {
    pub turn: u32,
    pub call: ToolCall,
}

#[derive(Debug, Clone)]
pub struct PostToolUseEvent {
    pub turn: u32,
    pub call: ToolCall,
    pub result: ToolResult,
    /// Wall-clock time the tool invocation itself took, in milliseconds.
    pub duration_ms: u64,
}

/// What a hook decides to do with a tool call.
#[derive(Debug, Clone)]
pub enum HookOutcome {
    /// Proceed unchanged.
    Allow,
    /// Proceed, but shallow-merge these fields into the tool call's
    /// arguments (pre) or into the result's details (post).
    Modify(JsonObject),
    /// Veto the call outright, with a human-readable reason.
    Block { reason: String },
}

#[async_trait]
pub trait Hook: Send + Sync {
    async fn on_pre_tool_use(&self, _event: &PreToolUseEvent) -> HookOutcome {
        HookOutcome::Allow
    }

    async fn on_post_tool_use(&self, _event: &PostToolUseEvent) -> HookOutcome {
        HookOutcome::Allow
    }
}

/// Runs the registered hooks for a point in a fixed order, short-circuiting
/// on the first `Block`, and shallow-merging every `Modify` outcome before
/// returning. A hook implementation that panics is treated as `Allow`.
#[derive(Default)]
pub struct HookEngine {
    hooks: Vec<Box<dyn Hook>>,
}

pub enum AggregatedOutcome {
    Allow,
    Modify(JsonObject),
    Block { reason: String },
}

impl HookEngine {
    pub fn new() -> Self {
        HookEngine { hooks: Vec::new() }
    }

    pub fn register(&mut self, hook: Box<dyn Hook>) {
        self.hooks.push(hook);
    }

    pub async fn run_pre_tool_use(&self, event: &PreToolUseEvent) -> AggregatedOutcome {
        let mut merged = Map::new();
        for hook in &self.hooks {
            let outcome = match run_pre_catching_panic(hook.as_ref(), event).await {
                Ok(o) => o,
                Err(_) => {
                    log::error!("pre_tool_use hook panicked; treating as allow");
                    HookOutcome::Allow
                }
            };
            match outcome {
                HookOutcome::Allow => {}
                HookOutcome::Modify(fields) => shallow_merge(&mut merged, fields),
                HookOutcome::Block { reason } => return AggregatedOutcome::Block { reason },
            }
        }
        if merged.is_empty() {
            AggregatedOutcome::Allow
        } else {
            AggregatedOutcome::Modify(merged)
        }
    }

    pub async fn run_post_tool_use(&self, event: &PostToolUseEvent) -> AggregatedOutcome {
        let mut merged = Map::new();
        for hook in &self.hooks {
            let outcome = match run_post_catching_panic(hook.as_ref(), event).await {
                Ok(o) => o,
                Err(_) => {
                    log::error!("post_tool_use hook panicked; treating as allow");
                    HookOutcome::Allow
                }
            };
            match outcome {
                HookOutcome::Allow => {}
                HookOutcome::Modify(fields) => shallow_merge(&mut merged, fields),
                HookOutcome::Block { reason } => return AggregatedOutcome::Block { reason },
            }
        }
        if merged.is_empty() {
            AggregatedOutcome::Allow
        } else {
            AggregatedOutcome::Modify(merged)
        }
    }
}

async fn run_pre_catching_panic(
    hook: &dyn Hook,
    event: &PreToolUseEvent,
) -> std::result::Result<HookOutcome, ()> {
    AssertUnwindSafe(hook.on_pre_tool_use(event))
        .catch_unwind()
        .await
        .map_err(|_| ())
}

async fn run_post_catching_panic(
    hook: &dyn Hook,
    event: &PostToolUseEvent,
) -> std::result::Result<HookOutcome, ()> {
    AssertUnwindSafe(hook.on_post_tool_use(event))
        .catch_unwind()
        .await
        .map_err(|_| ())
}

fn shallow_merge(target: &mut JsonObject, source: JsonObject) {
    for (key, value) in source {
        target.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AllowHook;
    #[async_trait]
    impl Hook for AllowHook {}

    struct ModifyHook(&'static str, Value);
    #[async_trait]
    impl Hook for ModifyHook {
        async fn on_pre_tool_use(&self, _event: &PreToolUseEvent) -> HookOutcome {
            let mut m = Map::new();
            m.insert(self.0.to_string(), self.1.clone());
            HookOutcome::Modify(m)
        }
    }

    struct BlockHook;
    #[async_trait]
    impl Hook for BlockHook {
        async fn on_pre_tool_use(&self, _event: &PreToolUseEvent) -> HookOutcome {
            HookOutcome::Block {
                reason: "not allowed".into(),
            }
        }
    }

    struct PanicHook;
    #[async_trait]
    impl Hook for PanicHook {
        async fn on_pre_tool_use(&self, _event: &PreToolUseEvent) -> HookOutcome {
            panic!("boom");
        }
    }

    fn sample_event() -> PreToolUseEvent {
        PreToolUseEvent {
            turn: 1,
            call: ToolCall {
                id: "call_1".into(),
                name: "add".into(),
                arguments: Map::new(),
            },
        }
    }

    #[tokio::test]
    async fn no_hooks_allows() {
        let engine = HookEngine::new();
        assert!(matches!(
            engine.run_pre_tool_use(&sample_event()).await,
            AggregatedOutcome::Allow
        ));
    }

    #[tokio::test]
    async fn block_short_circuits_remaining_hooks() {
        let mut engine = HookEngine::new();
        engine.register(Box::new(BlockHook));
        engine.register(Box::new(ModifyHook("x", Value::from(1))));
        match engine.run_pre_tool_use(&sample_event()).await {
            AggregatedOutcome::Block { reason } => assert_eq!(reason, "not allowed"),
            _ => panic!("expected block"),
        }
    }

    #[tokio::test]
    async fn modify_outcomes_shallow_merge() {
        let mut engine = HookEngine::new();
        engine.register(Box::new(ModifyHook("a", Value::from(1))));
        engine.register(Box::new(ModifyHook("b", Value::from(2))));
        match engine.run_pre_tool_use(&sample_event()).await {
            AggregatedOutcome::Modify(fields) => {
                assert_eq!(fields.get("a"), Some(&Value::from(1)));
                assert_eq!(fields.get("b"), Some(&Value::from(2)));
            }
            _ => panic!("expected modify"),
        }
    }

    #[tokio::test]
    async fn panicking_hook_degrades_to_allow() {
        let mut engine = HookEngine::new();
        engine.register(Box::new(PanicHook));
        engine.register(Box::new(AllowHook));
        assert!(matches!(
            engine.run_pre_tool_use(&sample_event()).await,
            AggregatedOutcome::Allow
        ));
    }
}
