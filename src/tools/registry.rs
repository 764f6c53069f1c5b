//! Name-dispatching tool backend over registered [`Tool`]s.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::arguments::ToolArguments;
use super::catalogue::ToolCatalogue;
use super::tool::{Tool, ToolExecutionContext};
use crate::backend::ToolBackend;
use crate::error::LoopError;
use crate::types::{AgentToolCall, ModelMessage};
use crate::util::with_cancel;

/// Registered tools in insertion order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tools, rejecting duplicate names.
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Result<Self, LoopError> {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), LoopError> {
        if self.get(tool.name()).is_some() {
            return Err(LoopError::Configuration(format!(
                "tool already registered: {}",
                tool.name()
            )));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The catalogue describing every registered tool, in registration order.
    pub fn catalogue(&self) -> ToolCatalogue {
        ToolCatalogue::from_unique(self.tools.iter().map(|t| t.definition().clone()))
    }
}

#[async_trait]
impl ToolBackend for ToolRegistry {
    async fn invoke(
        &self,
        call: &AgentToolCall,
        cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| LoopError::ToolNotFound(call.name.clone()))?;
        let args = ToolArguments::new(call.arguments.clone());
        let ctx = ToolExecutionContext::for_call(call, cancel);

        debug!(tool_name = %call.name, call_id = %call.id, "executing tool");
        let value = with_cancel(cancel, tool.run(args, ctx))
            .await
            .map_err(|e| match e {
                LoopError::Canceled | LoopError::ToolExecution { .. } => e,
                other => LoopError::tool(&call.name, other.to_string()),
            })?;
        Ok(ModelMessage::tool_result(&call.id, value, false))
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tools.iter().map(|t| t.name()).collect();
        f.debug_struct("ToolRegistry").field("tools", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::tool::AgentTool;
    use crate::tools::types::{AgentToolParameters, ToolDefinition};

    fn echo_named(name: &str) -> Arc<dyn Tool> {
        let definition = ToolDefinition::new(
            name,
            "Echo the input",
            AgentToolParameters::object()
                .string("text", "Text to echo", true)
                .build(),
        );
        Arc::new(AgentTool::new(definition, |args, _ctx| async move {
            Ok(serde_json::json!(args.string("text")?))
        }))
    }

    fn echo() -> Arc<dyn Tool> {
        echo_named("echo")
    }

    #[test]
    fn catalogue_lists_every_tool_in_registration_order() {
        let mut registry =
            ToolRegistry::from_tools([echo_named("zeta"), echo_named("alpha")]).unwrap();
        registry.register(echo_named("mid")).unwrap();
        let catalogue = registry.catalogue();
        assert_eq!(catalogue.names(), vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            catalogue.get("alpha"),
            Some(registry.get("alpha").unwrap().definition())
        );
    }

    #[tokio::test]
    async fn tool_sees_the_call_it_answers() {
        let definition =
            ToolDefinition::new("whoami", "Report the call id", AgentToolParameters::empty());
        let tool: Arc<dyn Tool> = Arc::new(AgentTool::new(definition, |_args, ctx| async move {
            Ok(serde_json::json!(ctx.tool_call_id))
        }));
        let registry = ToolRegistry::from_tools([tool]).unwrap();
        let call = AgentToolCall::new("call_42", "whoami", serde_json::json!({}));
        let message = registry
            .invoke(&call, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message.text(), "call_42");
    }

    #[tokio::test]
    async fn dispatches_by_name_and_tags_call_id() {
        let registry = ToolRegistry::from_tools([echo()]).unwrap();
        let call = AgentToolCall::new("call_1", "echo", serde_json::json!({"text": "hi"}));
        let message = registry
            .invoke(&call, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(message.tool_call_id(), Some("call_1"));
        assert_eq!(message.text(), "hi");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::from_tools([echo()]).unwrap();
        let call = AgentToolCall::new("call_1", "missing", serde_json::json!({}));
        let err = registry
            .invoke(&call, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::ToolNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn argument_errors_are_attributed_to_the_tool() {
        let registry = ToolRegistry::from_tools([echo()]).unwrap();
        let call = AgentToolCall::new("call_1", "echo", serde_json::json!({}));
        let err = registry
            .invoke(&call, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::ToolExecution { tool_name, .. } if tool_name == "echo"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let err = ToolRegistry::from_tools([echo(), echo()]).unwrap_err();
        assert!(matches!(err, LoopError::Configuration(_)));
    }
}
