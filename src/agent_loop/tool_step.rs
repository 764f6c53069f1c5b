//! The tool turn and early-exit policies.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::events::{RunEventEmitter, RunEventPayload};
use super::state::LoopState;
use crate::backend::{ToolBackend, ToolOutput};
use crate::error::LoopError;
use crate::types::{AgentToolCall, ModelMessage};
use crate::util::with_cancel;

/// Decides, after a tool batch, whether one result ends the run directly.
///
/// Returning a call id routes the run to the terminal selector, which hands
/// that call's result back to the caller without another model turn. The id
/// must name a call answered in `results`.
pub trait TerminalPolicy: Send + Sync {
    fn terminal_call_id(
        &self,
        calls: &[AgentToolCall],
        results: &[ModelMessage],
        state: &LoopState,
    ) -> Option<String>;
}

/// Every result goes back to the model. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverReturnDirectly;

impl TerminalPolicy for NeverReturnDirectly {
    fn terminal_call_id(
        &self,
        _calls: &[AgentToolCall],
        _results: &[ModelMessage],
        _state: &LoopState,
    ) -> Option<String> {
        None
    }
}

/// Results of the named tools are returned to the caller verbatim.
///
/// When several qualifying calls appear in one batch, the first in call
/// order wins.
#[derive(Debug, Clone, Default)]
pub struct ReturnDirectly {
    tools: HashSet<String>,
}

impl ReturnDirectly {
    pub fn new<I, S>(tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tools: tools.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.tools.contains(tool_name)
    }
}

impl TerminalPolicy for ReturnDirectly {
    fn terminal_call_id(
        &self,
        calls: &[AgentToolCall],
        results: &[ModelMessage],
        _state: &LoopState,
    ) -> Option<String> {
        calls
            .iter()
            .filter(|call| self.tools.contains(&call.name))
            .find(|call| results.iter().any(|r| r.tool_call_id() == Some(call.id.as_str())))
            .map(|call| call.id.clone())
    }
}

impl<F> TerminalPolicy for F
where
    F: Fn(&[AgentToolCall], &[ModelMessage], &LoopState) -> Option<String> + Send + Sync,
{
    fn terminal_call_id(
        &self,
        calls: &[AgentToolCall],
        results: &[ModelMessage],
        state: &LoopState,
    ) -> Option<String> {
        self(calls, results, state)
    }
}

/// Dispatches the pending tool calls of the latest model message.
#[derive(Clone)]
pub struct ToolStep {
    backend: Arc<dyn ToolBackend>,
    policy: Arc<dyn TerminalPolicy>,
    streaming: bool,
    idle_timeout: Option<Duration>,
}

impl ToolStep {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self {
            backend,
            policy: Arc::new(NeverReturnDirectly),
            streaming: false,
            idle_timeout: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn TerminalPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Run every tool call in `input`, or in the last history message when
    /// `input` is `None`.
    ///
    /// A supplied input is appended to history first; a message taken from
    /// the tail of history is not appended again. Each result is appended as
    /// soon as it arrives, so a failing call leaves earlier results in
    /// history. Calls run one at a time, in order.
    pub async fn run(
        &self,
        state: &mut LoopState,
        input: Option<ModelMessage>,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, LoopError> {
        self.run_observed(state, input, cancel, None).await
    }

    pub(crate) async fn run_observed(
        &self,
        state: &mut LoopState,
        input: Option<ModelMessage>,
        cancel: &CancellationToken,
        emitter: Option<&RunEventEmitter>,
    ) -> Result<ToolOutput, LoopError> {
        let calls: Vec<AgentToolCall> = match input {
            Some(message) => {
                let calls = message.tool_calls().into_iter().cloned().collect();
                state.append(message);
                calls
            }
            None => state
                .last()
                .ok_or_else(|| LoopError::InvalidState("tool turn with empty history".into()))?
                .tool_calls()
                .into_iter()
                .cloned()
                .collect(),
        };
        if calls.is_empty() {
            warn!("tool turn entered without tool calls");
        }

        let mut results = Vec::with_capacity(calls.len());
        for call in &calls {
            if let Some(emitter) = emitter {
                emitter.emit(RunEventPayload::ToolCallStarted { call: call.clone() });
            }
            debug!(tool_name = %call.name, call_id = %call.id, "dispatching tool call");

            let result = self.dispatch(call, cancel).await?;
            if let Some(emitter) = emitter {
                emitter.emit(RunEventPayload::ToolCallCompleted {
                    call_id: call.id.clone(),
                    is_error: result.tool_result_part().is_some_and(|r| r.is_error),
                });
            }
            state.append(result.clone());
            results.push(result);
        }

        let terminal = self.policy.terminal_call_id(&calls, &results, state);
        state.set_terminal_call_id(terminal);
        Ok(ToolOutput::new(results))
    }

    async fn dispatch(
        &self,
        call: &AgentToolCall,
        cancel: &CancellationToken,
    ) -> Result<ModelMessage, LoopError> {
        let message = if self.streaming {
            let stream = with_cancel(cancel, self.backend.stream(call, cancel)).await?;
            let (message, _) = stream
                .with_idle_timeout(self.idle_timeout)
                .into_message(cancel)
                .await?;
            message
        } else {
            with_cancel(cancel, self.backend.invoke(call, cancel)).await?
        };

        let answered = message.tool_call_id().map(str::to_owned);
        match answered.as_deref() {
            Some(id) if id == call.id => Ok(message),
            // Plain streamed text: attach it to the call it answers.
            None | Some("") => Ok(ModelMessage::tool_result(
                &call.id,
                serde_json::Value::String(message.text()),
                false,
            )),
            Some(other) => Err(LoopError::InvalidState(format!(
                "tool result answers call '{other}', expected '{}'",
                call.id
            ))),
        }
    }
}

impl std::fmt::Debug for ToolStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStep")
            .field("streaming", &self.streaming)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}
