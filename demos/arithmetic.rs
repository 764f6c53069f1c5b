//! Arithmetic tutor demo: a scripted "model" that solves `183+192-90` with
//! the built-in tools, then grades the problem's difficulty.
//!
//! The model backend is rule-based, so the demo runs offline. It streams its
//! replies chunk by chunk, which shows the executor deciding routes before
//! each reply is complete.
//!
//! Run: `RUST_LOG=toolloop=debug cargo run --example arithmetic`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use toolloop::agent_loop::{RunEvent, RunEventPayload};
use toolloop::prelude::*;
use toolloop::tools::builtin::all_tools;

const SYSTEM_PROMPT: &str = "You are a patient arithmetic tutor for young children. \
Use the tools for every calculation, then tell the child the answer and how hard the problem was.";

/// Decides its next move from the tool results already in the conversation.
struct TutorModel;

impl TutorModel {
    fn tool_results(messages: &[ModelMessage]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .filter_map(|m| m.tool_result_part())
            .map(|r| r.result.clone())
            .collect()
    }

    fn next_reply(messages: &[ModelMessage]) -> Vec<MessageChunk> {
        let results = Self::tool_results(messages);
        match results.as_slice() {
            [] => vec![
                MessageChunk::default(),
                MessageChunk::tool_calls(vec![AgentToolCall::new(
                    "call_add",
                    "add",
                    serde_json::json!({"a": 183, "b": 192}),
                )]),
            ],
            [sum] => vec![MessageChunk::tool_calls(vec![
                AgentToolCall::new(
                    "call_subtract",
                    "subtract",
                    serde_json::json!({"a": sum, "b": 90}),
                ),
                AgentToolCall::new(
                    "call_grade",
                    "analyze_difficulty",
                    serde_json::json!({"expression": "183+192-90"}),
                ),
            ])],
            [.., difference, report] => {
                let label = report["difficulty"].as_str().unwrap_or("unknown");
                vec![
                    MessageChunk::text("183 + 192 - 90 "),
                    MessageChunk::text(format!("= {difference}. ")),
                    MessageChunk::text(format!("This one is {label}!")),
                ]
            }
        }
    }
}

#[async_trait]
impl ModelBackend for TutorModel {
    fn name(&self) -> &str {
        "tutor"
    }

    async fn generate(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelMessage> {
        let (message, _) = ChunkStream::from_iter(Self::next_reply(&request.messages))
            .into_message(cancel)
            .await?;
        Ok(message)
    }

    async fn stream(
        &self,
        request: &ModelRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChunkStream<MessageChunk>> {
        let chunks = Self::next_reply(&request.messages);
        Ok(ChunkStream::new(async_stream::stream! {
            for chunk in chunks {
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield Ok(chunk);
            }
        }))
    }
}

fn print_event(event: RunEvent) {
    match event.payload {
        RunEventPayload::Routed { from, to } => println!("[{:>2}] {from} -> {to}", event.seq),
        RunEventPayload::ToolCallStarted { call } => {
            println!("[{:>2}]   tool {}({})", event.seq, call.name, call.arguments)
        }
        RunEventPayload::AssistantDelta { text } => println!("[{:>2}]   delta {text:?}", event.seq),
        RunEventPayload::Lifecycle { state } => println!("[{:>2}] {state:?}", event.seq),
        _ => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = LoopConfig::load()?;
    let registry = ToolRegistry::from_tools(all_tools())?;
    let graph = LoopGraph::with_registry(Arc::new(TutorModel), registry)
        .with_config(config)
        .with_event_sink(Arc::new(print_event));

    let seed = vec![
        ModelMessage::system(SYSTEM_PROMPT),
        ModelMessage::user("What is 183+192-90? And is that a hard problem?"),
    ];
    let outcome = graph.start(seed).wait().await?;

    println!();
    println!("answer : {}", outcome.message.text());
    println!("trace  : {:?}", outcome.trace);
    println!("steps  : {}", outcome.steps);
    println!("history: {} messages", outcome.history.len());
    Ok(())
}
