//! Routing decisions after each step.
//!
//! The stream predicates take ownership of the stream they inspect and close
//! it before returning, whichever route is chosen and on error.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;

use super::state::LoopState;
use crate::error::LoopError;
use crate::stream::ChunkStream;
use crate::types::{MessageChunk, ModelMessage};

/// Where a model turn leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelRoute {
    End,
    ToolTurn,
}

/// Where a tool turn leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolRoute {
    ModelTurn,
    DirectReturn,
}

/// Route a streamed model reply.
///
/// The first chunk with tool calls routes to [`ModelRoute::ToolTurn`] and
/// nothing further is read. Chunks with neither content nor tool calls are
/// skipped. The first chunk with content only, or the end of the stream,
/// routes to [`ModelRoute::End`].
pub async fn route_after_model(
    mut stream: ChunkStream<MessageChunk>,
    cancel: &CancellationToken,
) -> Result<ModelRoute, LoopError> {
    let route = first_decisive_chunk(&mut stream, cancel).await;
    stream.close();
    route
}

async fn first_decisive_chunk(
    stream: &mut ChunkStream<MessageChunk>,
    cancel: &CancellationToken,
) -> Result<ModelRoute, LoopError> {
    while let Some(chunk) = stream.recv(cancel).await? {
        if !chunk.tool_calls.is_empty() {
            return Ok(ModelRoute::ToolTurn);
        }
        if !chunk.is_empty() {
            return Ok(ModelRoute::End);
        }
    }
    Ok(ModelRoute::End)
}

/// Route a complete model message.
pub fn route_model_message(message: &ModelMessage) -> ModelRoute {
    if message.has_tool_calls() {
        ModelRoute::ToolTurn
    } else {
        ModelRoute::End
    }
}

/// Route after a tool turn. The result stream is closed unread; the
/// decision depends only on the state's terminal call id.
pub fn route_after_tools(mut stream: ChunkStream<ModelMessage>, state: &LoopState) -> ToolRoute {
    stream.close();
    route_tool_batch(state)
}

/// Route after a tool turn without a result stream.
pub fn route_tool_batch(state: &LoopState) -> ToolRoute {
    match state.terminal_call_id() {
        Some(_) => ToolRoute::DirectReturn,
        None => ToolRoute::ModelTurn,
    }
}
