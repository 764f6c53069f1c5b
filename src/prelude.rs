//! Convenience re-exports for common use.

pub use crate::agent_loop::{
    LoopGraph, LoopNode, LoopState, NeverReturnDirectly, ReturnDirectly, RunEvent,
    RunEventPayload, RunEventSink, RunHandle, RunOutcome, TerminalPolicy,
};
pub use crate::backend::{ModelBackend, ModelRequest, ToolBackend};
pub use crate::config::LoopConfig;
pub use crate::error::{LoopError, Result};
pub use crate::stream::ChunkStream;
pub use crate::tools::{
    AgentTool, AgentToolParameters, Tool, ToolArguments, ToolCatalogue, ToolDefinition,
    ToolRegistry,
};
pub use crate::types::{
    AgentToolCall, ContentPart, FinishReason, MessageChunk, ModelMessage, Role, Usage,
};
