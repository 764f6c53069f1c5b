//! Model and tool backend traits consumed by the loop.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LoopError;
use crate::stream::ChunkStream;
use crate::types::{AgentToolCall, MessageChunk, ModelMessage};

pub use crate::tools::types::ToolDefinition;

/// A request sent to a model backend.
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    /// Copy of the run's history at the time of the call.
    pub messages: Vec<ModelMessage>,
    /// The tool catalogue, in catalogue order.
    pub tools: Vec<ToolDefinition>,
}

/// Core trait implemented by chat-model backends.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name used in errors and logs.
    fn name(&self) -> &str;

    /// Produce one complete message.
    async fn generate(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError>;

    /// Produce the message as a lazy chunk stream.
    ///
    /// The default wraps [`generate`](Self::generate) in a one-chunk stream.
    async fn stream(
        &self,
        request: &ModelRequest,
        cancel: &CancellationToken,
    ) -> Result<ChunkStream<MessageChunk>, LoopError> {
        let message = self.generate(request, cancel).await?;
        Ok(ChunkStream::once(MessageChunk::from(message)))
    }
}

/// Core trait implemented by tool-execution backends.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Run one tool call and return a tool-result message carrying its id.
    async fn invoke(
        &self,
        call: &AgentToolCall,
        cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError>;

    /// Run one tool call, streaming its result.
    ///
    /// The default wraps [`invoke`](Self::invoke) in a one-chunk stream.
    async fn stream(
        &self,
        call: &AgentToolCall,
        cancel: &CancellationToken,
    ) -> Result<ChunkStream<MessageChunk>, LoopError> {
        let message = self.invoke(call, cancel).await?;
        Ok(ChunkStream::once(MessageChunk::from(message)))
    }
}

/// What a model turn produced.
#[derive(Debug)]
pub enum ModelOutput {
    Message(ModelMessage),
    Stream(ChunkStream<MessageChunk>),
}

impl ModelOutput {
    /// Materialize the output into a single message.
    pub async fn into_message(self, cancel: &CancellationToken) -> Result<ModelMessage, LoopError> {
        match self {
            Self::Message(message) => Ok(message),
            Self::Stream(stream) => Ok(stream.into_message(cancel).await?.0),
        }
    }
}

/// The tool-result messages of one tool turn, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub results: Vec<ModelMessage>,
}

impl ToolOutput {
    pub fn new(results: Vec<ModelMessage>) -> Self {
        Self { results }
    }

    /// Expose the batch as a stream of result messages.
    pub fn stream(&self) -> ChunkStream<ModelMessage> {
        ChunkStream::from_iter(self.results.clone())
    }
}
