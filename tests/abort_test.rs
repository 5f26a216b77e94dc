//! Cooperative cancellation: tripping `Client::abort()` while a turn is
//! blocked inside the provider call causes the run to end with
//! `Error::Aborted` as soon as the stream processor reaches its next
//! check point, without ever reporting a successful turn.

mod common;

use std::sync::Arc;

use agent_core::{AgentOptions, Client, Error};
use tokio::sync::Notify;

#[tokio::test]
async fn abort_during_a_blocked_provider_call_surfaces_as_aborted() {
    let gate = Arc::new(Notify::new());
    let provider = Box::new(common::GatedProvider {
        gate: gate.clone(),
        text: "should never be seen".to_string(),
    });
    let client = Arc::new(Client::new("s1", provider, AgentOptions::default()));

    let run_client = client.clone();
    let run_handle = tokio::spawn(async move { run_client.run("hi").await });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    client.abort();
    gate.notify_one();

    let result = run_handle.await.unwrap();
    assert!(matches!(result, Err(Error::Aborted(_))));
    assert!(client.history().iter().all(|m| !matches!(m, agent_core::Message::Assistant { .. })));
}

#[tokio::test]
async fn tripping_abort_on_an_idle_client_is_a_harmless_no_op() {
    let client = Client::new("s1", common::end_turn("hi"), AgentOptions::default());
    client.abort();
    let produced = client.run("hello").await.unwrap();
    assert_eq!(produced.len(), 2);
}

#[tokio::test]
async fn abort_emits_agent_interrupted_exactly_once() {
    use agent_core::{Event, EventSubscriber};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(Arc<AtomicUsize>);
    impl EventSubscriber for Counter {
        fn on_event(&self, event: &Event) {
            if matches!(event, Event::AgentInterrupted { .. }) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    let gate = Arc::new(Notify::new());
    let provider = Box::new(common::GatedProvider {
        gate: gate.clone(),
        text: "should never be seen".to_string(),
    });
    let client = Arc::new(Client::new("s1", provider, AgentOptions::default()));
    let count = Arc::new(AtomicUsize::new(0));
    client.subscribe(Box::new(Counter(count.clone())));

    let run_client = client.clone();
    let run_handle = tokio::spawn(async move { run_client.run("hi").await });

    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    client.abort();
    gate.notify_one();

    let result = run_handle.await.unwrap();
    assert!(matches!(result, Err(Error::Aborted(_))));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

/// §4.7 / I2: a turn interrupted between tool calls keeps the assistant
/// message and every tool result already produced, and synthesizes an
/// error result for the call that never got to run, rather than losing
/// the whole turn's history.
#[tokio::test]
async fn abort_mid_tool_loop_preserves_assistant_message_and_synthesizes_remaining_results() {
    use agent_core::{AssistantBlock, Message, StopReason, StreamEvent};
    use serde_json::Map;

    let provider = Box::new(common::ScriptedProvider {
        events: vec![StreamEvent::Done {
            message: vec![
                AssistantBlock::ToolUse {
                    id: "call_1".into(),
                    name: "slow".into(),
                    arguments: Map::new(),
                },
                AssistantBlock::ToolUse {
                    id: "call_2".into(),
                    name: "slow".into(),
                    arguments: Map::new(),
                },
            ],
            stop_reason: StopReason::ToolUse,
            usage: None,
        }],
    });
    let client = Arc::new(Client::new("s1", provider, AgentOptions::default()));

    // The first tool call trips the client's abort token as a side effect
    // of running, simulating an external `abort()` landing while it's in
    // flight; the second tool call must never execute.
    let client_for_tool = client.clone();
    client
        .register_tool(agent_core::tool("slow", "", Map::new(), move |_args| {
            let client = client_for_tool.clone();
            async move {
                client.abort();
                Ok(agent_core::ToolResult::success("done"))
            }
        }))
        .unwrap();

    let result = client.run("go").await;
    assert!(matches!(result, Err(Error::Aborted(_))));

    let history = client.history();
    assert!(matches!(history[1], Message::Assistant { .. }));
    match &history[2] {
        Message::ToolResult { tool_call_id, is_error, .. } => {
            assert_eq!(tool_call_id, "call_1");
            assert!(!is_error);
        }
        other => panic!("expected call_1's real result, got {other:?}"),
    }
    match &history[3] {
        Message::ToolResult { tool_call_id, is_error, .. } => {
            assert_eq!(tool_call_id, "call_2");
            assert!(is_error, "call_2 never ran and must be a synthetic error result");
        }
        other => panic!("expected a synthetic result for call_2, got {other:?}"),
    }
}
