//! The rebuild rule and missed-tool rescue, exercised end to end through
//! `Client::run` rather than directly against `process_stream` (which has
//! its own focused unit tests in `src/stream_processor.rs`).

mod common;

use agent_core::{AgentOptions, AssistantBlock, Client, Message, StopReason, StreamEvent};
use serde_json::Map;

#[tokio::test]
async fn empty_done_message_falls_back_to_the_streamed_blocks() {
    let streamed = AssistantBlock::Text("streamed content".to_string());
    let provider = Box::new(common::ScriptedProvider {
        events: vec![
            StreamEvent::BlockCompleted { block: streamed.clone() },
            StreamEvent::Done {
                message: vec![],
                stop_reason: StopReason::EndTurn,
                usage: None,
            },
        ],
    });
    let client = Client::new("s1", provider, AgentOptions::default());

    let produced = client.run("hi").await.unwrap();
    match &produced[1] {
        Message::Assistant { content, .. } => assert_eq!(content, &vec![streamed]),
        other => panic!("expected assistant message, got {other:?}"),
    }
}

#[tokio::test]
async fn a_nonempty_done_message_wins_outright_over_streamed_deltas() {
    let provider = Box::new(common::ScriptedProvider {
        events: vec![
            StreamEvent::TextDelta { delta: "partial ".to_string() },
            StreamEvent::TextDelta { delta: "guess".to_string() },
            StreamEvent::Done {
                message: vec![AssistantBlock::Text("final answer".to_string())],
                stop_reason: StopReason::EndTurn,
                usage: None,
            },
        ],
    });
    let client = Client::new("s1", provider, AgentOptions::default());

    let produced = client.run("hi").await.unwrap();
    match &produced[1] {
        Message::Assistant { content, .. } => {
            assert_eq!(content, &vec![AssistantBlock::Text("final answer".to_string())]);
        }
        other => panic!("expected assistant message, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_use_missing_from_streamed_blocks_is_rescued_from_done() {
    let streamed_text = AssistantBlock::Text("checking...".to_string());
    let missed_tool = AssistantBlock::ToolUse {
        id: "call_1".to_string(),
        name: "lookup".to_string(),
        arguments: Map::new(),
    };
    let provider = Box::new(common::ChainedProvider::new(vec![
        vec![
            StreamEvent::BlockCompleted { block: streamed_text.clone() },
            StreamEvent::Done {
                message: vec![streamed_text.clone(), missed_tool.clone()],
                stop_reason: StopReason::ToolUse,
                usage: None,
            },
        ],
        vec![StreamEvent::Done {
            message: vec![AssistantBlock::Text("done".to_string())],
            stop_reason: StopReason::EndTurn,
            usage: None,
        }],
    ]));
    let client = Client::new("s1", provider, AgentOptions::default());
    client
        .register_tool(agent_core::tool("lookup", "", Map::new(), |_args| async {
            Ok(agent_core::ToolResult::success("found it"))
        }))
        .unwrap();

    let produced = client.run("hi").await.unwrap();
    match &produced[1] {
        Message::Assistant { content, .. } => assert_eq!(content, &vec![streamed_text, missed_tool]),
        other => panic!("expected assistant message, got {other:?}"),
    }
}
