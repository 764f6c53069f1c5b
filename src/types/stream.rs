//! Streaming message chunks and their reassembly.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::message::{AgentToolCall, AgentToolResult, ContentPart, ModelMessage, Role};
use super::usage::Usage;

/// One increment of a streamed message.
///
/// A chunk carries incremental text and/or a finalized tool-call set. Tool
/// backends that stream set `tool_call_id` so the reassembled message answers
/// the right call.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<AgentToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// A complete tool result; takes precedence over streamed text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<AgentToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// The whole message this chunk was made from. A stream of exactly this
    /// one chunk reassembles to it unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<ModelMessage>>,
}

impl MessageChunk {
    /// A text-only chunk.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// A chunk carrying a finalized tool-call set.
    pub fn tool_calls(calls: Vec<AgentToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    /// A chunk of streamed tool output answering `tool_call_id`.
    pub fn tool_output(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Tool),
            text: text.into(),
            tool_call_id: Some(tool_call_id.into()),
            ..Default::default()
        }
    }

    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Whether this chunk carries neither content nor tool calls.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
            && self.tool_calls.is_empty()
            && self.tool_result.is_none()
            && self.message.is_none()
    }
}

impl From<ModelMessage> for MessageChunk {
    fn from(message: ModelMessage) -> Self {
        let mut chunk = MessageChunk {
            role: Some(message.role),
            message: Some(Box::new(message.clone())),
            ..Default::default()
        };
        for part in message.content {
            match part {
                ContentPart::Text { text } => chunk.text.push_str(&text),
                ContentPart::ToolCall(call) => chunk.tool_calls.push(call),
                ContentPart::ToolResult(result) => {
                    chunk.tool_call_id = Some(result.tool_call_id.clone());
                    chunk.tool_result = Some(result);
                }
            }
        }
        chunk
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// Accumulates chunks into one logical message.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    role: Option<Role>,
    text: String,
    tool_calls: Vec<AgentToolCall>,
    tool_call_id: Option<String>,
    tool_result: Option<AgentToolResult>,
    finish_reason: Option<FinishReason>,
    usage: Option<Usage>,
    whole: Option<ModelMessage>,
    chunks: usize,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk in. Tool calls with an id already seen replace the
    /// earlier entry; new ids are appended in arrival order.
    pub fn push(&mut self, chunk: MessageChunk) {
        self.chunks += 1;
        if let Some(message) = chunk.message {
            self.whole = Some(*message);
        }
        if let Some(role) = chunk.role {
            self.role = Some(role);
        }
        self.text.push_str(&chunk.text);
        for call in chunk.tool_calls {
            if let Some(existing) = self.tool_calls.iter_mut().find(|c| c.id == call.id) {
                *existing = call;
            } else {
                self.tool_calls.push(call);
            }
        }
        if chunk.tool_call_id.is_some() {
            self.tool_call_id = chunk.tool_call_id;
        }
        if chunk.tool_result.is_some() {
            self.tool_result = chunk.tool_result;
        }
        if chunk.finish_reason.is_some() {
            self.finish_reason = chunk.finish_reason;
        }
        if let Some(usage) = chunk.usage {
            self.usage.get_or_insert_with(Usage::default).merge(&usage);
        }
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }

    /// Build the final message.
    ///
    /// A single chunk made from a whole message yields that message as-is.
    pub fn finish(self) -> ModelMessage {
        if self.chunks == 1 {
            if let Some(message) = self.whole {
                return message;
            }
        }
        if let Some(result) = self.tool_result {
            return ModelMessage::tool_result(result.tool_call_id, result.result, result.is_error);
        }
        if let Some(id) = self.tool_call_id {
            return ModelMessage::tool_result(id, serde_json::Value::String(self.text), false);
        }
        match self.role.unwrap_or(Role::Assistant) {
            Role::Assistant => ModelMessage::assistant_with_tool_calls(self.text, self.tool_calls),
            Role::System => ModelMessage::system(self.text),
            Role::User => ModelMessage::user(self.text),
            Role::Tool => ModelMessage::tool_result(
                String::new(),
                serde_json::Value::String(self.text),
                false,
            ),
        }
    }
}
