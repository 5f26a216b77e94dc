//! Shared fixtures for the integration test binaries.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use agent_core::{AssistantBlock, Context, Provider, ProviderStream, ProviderStreamOptions, Result, StopReason, StreamEvent};
use async_trait::async_trait;
use futures::stream;
use tokio::sync::Notify;

/// Replays the same scripted event list for every turn, regardless of the
/// context passed in. Good enough for exercising the turn loop and stream
/// processor without a real HTTP server.
pub struct ScriptedProvider {
    pub events: Vec<StreamEvent>,
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn stream(&self, _context: &Context, _options: &ProviderStreamOptions) -> Result<ProviderStream> {
        let events: Vec<Result<StreamEvent>> = self.events.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

#[allow(dead_code)]
pub fn end_turn(text: &str) -> Box<dyn Provider> {
    Box::new(ScriptedProvider {
        events: vec![StreamEvent::Done {
            message: vec![AssistantBlock::Text(text.to_string())],
            stop_reason: StopReason::EndTurn,
            usage: None,
        }],
    })
}

/// Plays a different script each time `stream()` is called, in order —
/// one entry per provider turn a multi-turn scenario needs.
pub struct ChainedProvider {
    scripts: Vec<Vec<StreamEvent>>,
    next: AtomicUsize,
}

impl ChainedProvider {
    #[allow(dead_code)]
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        ChainedProvider {
            scripts,
            next: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Provider for ChainedProvider {
    async fn stream(&self, _context: &Context, _options: &ProviderStreamOptions) -> Result<ProviderStream> {
        let idx = self.next.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.get(idx).cloned().unwrap_or_default();
        let events: Vec<Result<StreamEvent>> = script.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(events)))
    }

    fn model_name(&self) -> &str {
        "chained"
    }
}

/// A provider whose `stream()` call blocks on a shared `Notify` before
/// producing any events — used to hold a run open so a concurrent mutator
/// call can observe `AgentBusy`.
pub struct GatedProvider {
    pub gate: Arc<Notify>,
    pub text: String,
}

#[async_trait]
impl Provider for GatedProvider {
    async fn stream(&self, _context: &Context, _options: &ProviderStreamOptions) -> Result<ProviderStream> {
        self.gate.notified().await;
        Ok(Box::pin(stream::iter(vec![Ok(StreamEvent::Done {
            message: vec![AssistantBlock::Text(self.text.clone())],
            stop_reason: StopReason::EndTurn,
            usage: None,
        })])))
    }

    fn model_name(&self) -> &str {
        "gated"
    }
}
