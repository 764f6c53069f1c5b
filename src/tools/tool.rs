//! The [`Tool`] trait and closure-backed tools.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::types::ToolDefinition;
use crate::error::LoopError;
use crate::types::AgentToolCall;

/// What a running tool knows about the call it answers.
#[derive(Debug, Clone)]
pub struct ToolExecutionContext {
    pub tool_call_id: String,
    /// Fires when the run is canceled; long-running tools should watch it.
    pub cancel: CancellationToken,
}

impl ToolExecutionContext {
    pub(crate) fn for_call(call: &AgentToolCall, cancel: &CancellationToken) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            cancel: cancel.clone(),
        }
    }
}

/// A callable tool. Register implementations with a
/// [`ToolRegistry`](super::ToolRegistry).
#[async_trait]
pub trait Tool: Send + Sync {
    /// What the model is told about this tool.
    fn definition(&self) -> &ToolDefinition;

    fn name(&self) -> &str {
        &self.definition().name
    }

    async fn run(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> Result<serde_json::Value, LoopError>;
}

type Handler = dyn Fn(
        ToolArguments,
        ToolExecutionContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, LoopError>> + Send>>
    + Send
    + Sync;

/// A tool whose behavior is an async closure.
pub struct AgentTool {
    definition: ToolDefinition,
    handler: Box<Handler>,
}

impl AgentTool {
    pub fn new<F, Fut>(definition: ToolDefinition, handler: F) -> Self
    where
        F: Fn(ToolArguments, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, LoopError>> + Send + 'static,
    {
        Self {
            definition,
            handler: Box::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn run(
        &self,
        args: ToolArguments,
        ctx: ToolExecutionContext,
    ) -> Result<serde_json::Value, LoopError> {
        (self.handler)(args, ctx).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AgentTool").field(&self.definition.name).finish()
    }
}
