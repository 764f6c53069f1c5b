//! Shared test helpers: scripted backends and stream instrumentation.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use toolloop::backend::{ModelBackend, ModelRequest, ToolBackend};
use toolloop::error::LoopError;
use toolloop::stream::ChunkStream;
use toolloop::types::*;

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream these chunks, then end.
    Chunks(Vec<MessageChunk>),
    /// Stream these chunks, then fail with a stream error.
    Broken(Vec<MessageChunk>, String),
    /// Stream these chunks, then never yield again.
    Stall(Vec<MessageChunk>),
    /// Fail the backend call itself.
    Fail(String),
}

/// A model backend that plays back queued replies and counts stream closes.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    requests: Mutex<Vec<ModelRequest>>,
    generated: Mutex<Vec<ModelMessage>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            generated: Mutex::new(Vec::new()),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reply with `reply` forever once the queue is empty.
    pub fn always(reply: Reply) -> Self {
        let mut model = Self::new([]);
        model.fallback = Some(reply);
        model
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Messages returned from `generate`, in order.
    pub fn generated(&self) -> Vec<ModelMessage> {
        self.generated.lock().unwrap().clone()
    }

    pub fn streams_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn streams_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn next_reply(&self, request: &ModelRequest) -> Reply {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .unwrap_or_else(|| Reply::Chunks(vec![MessageChunk::text("Mock response")]))
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        request: &ModelRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError> {
        let chunks = match self.next_reply(request) {
            Reply::Chunks(chunks) => chunks,
            Reply::Broken(_, message) | Reply::Fail(message) => {
                return Err(LoopError::model("scripted", message))
            }
            Reply::Stall(_) => futures::future::pending().await,
        };
        let mut assembler = MessageAssembler::new();
        for chunk in chunks {
            assembler.push(chunk);
        }
        let message = assembler.finish();
        self.generated.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn stream(
        &self,
        request: &ModelRequest,
        _cancel: &CancellationToken,
    ) -> Result<ChunkStream<MessageChunk>, LoopError> {
        let stream = match self.next_reply(request) {
            Reply::Fail(message) => return Err(LoopError::model("scripted", message)),
            Reply::Chunks(chunks) => ChunkStream::from_iter(chunks),
            Reply::Broken(chunks, message) => ChunkStream::new(async_stream::stream! {
                for chunk in chunks {
                    yield Ok(chunk);
                }
                yield Err(LoopError::Stream(message));
            }),
            Reply::Stall(chunks) => ChunkStream::new(async_stream::stream! {
                for chunk in chunks {
                    yield Ok(chunk);
                }
                futures::future::pending::<()>().await;
            }),
        };
        self.opened.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::clone(&self.closed);
        Ok(stream.with_close_hook(move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

/// A model that only implements `generate`, always answering with `reply`.
pub struct FixedReply {
    pub reply: ModelMessage,
}

#[async_trait]
impl ModelBackend for FixedReply {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(
        &self,
        _request: &ModelRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError> {
        Ok(self.reply.clone())
    }
}

/// A stateless model: calls `echo` once, then answers with the user's text.
pub struct EchoAfterTool;

#[async_trait]
impl ModelBackend for EchoAfterTool {
    fn name(&self) -> &str {
        "echo-after-tool"
    }

    async fn generate(
        &self,
        request: &ModelRequest,
        _cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError> {
        let user = request
            .messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.text())
            .unwrap_or_default();
        if request.messages.iter().any(|m| m.tool_call_id().is_some()) {
            Ok(ModelMessage::assistant(format!("echo: {user}")))
        } else {
            Ok(ModelMessage::assistant_with_tool_calls(
                "",
                vec![AgentToolCall::new(
                    "call_echo",
                    "echo",
                    serde_json::json!({ "text": user }),
                )],
            ))
        }
    }
}

/// A tool backend that records calls and answers `"ok"`, failing for
/// tools named `explode`. Streams its answers when asked to, counting
/// stream opens and closes; an `explode` stream breaks after one chunk.
#[derive(Default)]
pub struct RecordingTools {
    calls: Mutex<Vec<AgentToolCall>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl RecordingTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<AgentToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn streams_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn streams_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolBackend for RecordingTools {
    async fn invoke(
        &self,
        call: &AgentToolCall,
        _cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError> {
        self.calls.lock().unwrap().push(call.clone());
        if call.name == "explode" {
            return Err(LoopError::tool(&call.name, "kaboom"));
        }
        Ok(ModelMessage::tool_result(
            &call.id,
            serde_json::json!("ok"),
            false,
        ))
    }

    async fn stream(
        &self,
        call: &AgentToolCall,
        _cancel: &CancellationToken,
    ) -> Result<ChunkStream<MessageChunk>, LoopError> {
        self.calls.lock().unwrap().push(call.clone());
        let first = MessageChunk::tool_output(&call.id, "o");
        let stream = if call.name == "explode" {
            ChunkStream::new(async_stream::stream! {
                yield Ok(first);
                yield Err(LoopError::Stream("tool stream reset".to_string()));
            })
        } else {
            ChunkStream::from_iter([first, MessageChunk::tool_output(&call.id, "k")])
        };
        self.opened.fetch_add(1, Ordering::SeqCst);
        let closed = Arc::clone(&self.closed);
        Ok(stream.with_close_hook(move || {
            closed.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

pub fn call(id: &str, name: &str, arguments: serde_json::Value) -> AgentToolCall {
    AgentToolCall::new(id, name, arguments)
}

/// A reply that requests one tool call, after an empty preamble chunk.
pub fn tool_reply(id: &str, name: &str, arguments: serde_json::Value) -> Reply {
    Reply::Chunks(vec![
        MessageChunk::default(),
        MessageChunk::tool_calls(vec![call(id, name, arguments)]),
    ])
}

/// A reply that streams `text` in small pieces.
pub fn text_reply(text: &str) -> Reply {
    let chunks = text
        .chars()
        .collect::<Vec<_>>()
        .chunks(5)
        .map(|piece| MessageChunk::text(piece.iter().collect::<String>()))
        .collect();
    Reply::Chunks(chunks)
}

/// The arithmetic tutor conversation.
pub fn tutor_seed() -> Vec<ModelMessage> {
    vec![
        ModelMessage::system("You are an arithmetic tutor for young children."),
        ModelMessage::user("Compute 183+192-90, then tell me how difficult it is."),
    ]
}

/// Model replies that solve the tutor conversation with the builtin tools.
pub fn tutor_script() -> Vec<Reply> {
    vec![
        tool_reply("call_add", "add", serde_json::json!({"a": 183, "b": 192})),
        Reply::Chunks(vec![MessageChunk::tool_calls(vec![
            call("call_sub", "subtract", serde_json::json!({"a": 375, "b": 90})),
            call(
                "call_grade",
                "analyze_difficulty",
                serde_json::json!({"expression": "183+192-90"}),
            ),
        ])]),
        text_reply("183 + 192 - 90 = 285. That problem is medium difficulty."),
    ]
}
