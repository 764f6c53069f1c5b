//! The loop executor: an explicit state machine over model and tool turns.
//!
//! ```text
//! Start ──▶ ModelTurn ──(tool calls)──▶ ToolTurn ──(terminal id)──▶ DirectReturn
//!              ▲   │                       │
//!              │   └──(no tool calls)──▶ End
//!              └───────────────────────────┘
//! ```
//!
//! `ModelTurn`, `ToolTurn` and `DirectReturn` each count as one step. A run
//! that would execute a step beyond `max_steps` fails with
//! [`LoopError::MaxStepsExceeded`]; nothing is returned in that case.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::branch::{
    route_after_model, route_after_tools, route_model_message, route_tool_batch, ModelRoute,
    ToolRoute,
};
use super::events::{RunEventEmitter, RunEventPayload, RunEventSink, RunLifecycle};
use super::model_step::ModelStep;
use super::state::LoopState;
use super::terminal::select_terminal;
use super::tool_step::{NeverReturnDirectly, TerminalPolicy, ToolStep};
use super::types::{RunHandle, RunId, RunOutcome, RunStatus};
use crate::backend::{ModelBackend, ModelOutput, ToolBackend, ToolOutput};
use crate::config::LoopConfig;
use crate::error::LoopError;
use crate::stream::ChunkStream;
use crate::tools::{ToolCatalogue, ToolRegistry};
use crate::types::{MessageChunk, ModelMessage};

/// Executor states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LoopNode {
    Start,
    ModelTurn,
    ToolTurn,
    DirectReturn,
    End,
}

impl LoopNode {
    /// Whether executing this node counts against the step bound.
    pub fn is_step(self) -> bool {
        matches!(self, Self::ModelTurn | Self::ToolTurn | Self::DirectReturn)
    }
}

impl From<ModelRoute> for LoopNode {
    fn from(route: ModelRoute) -> Self {
        match route {
            ModelRoute::End => Self::End,
            ModelRoute::ToolTurn => Self::ToolTurn,
        }
    }
}

impl From<ToolRoute> for LoopNode {
    fn from(route: ToolRoute) -> Self {
        match route {
            ToolRoute::ModelTurn => Self::ModelTurn,
            ToolRoute::DirectReturn => Self::DirectReturn,
        }
    }
}

/// A compiled model/tool loop.
///
/// Cheap to clone; every run gets its own [`LoopState`], so one graph can
/// serve any number of concurrent runs.
#[derive(Clone)]
pub struct LoopGraph {
    model: Arc<dyn ModelBackend>,
    tools: Arc<dyn ToolBackend>,
    catalogue: Arc<ToolCatalogue>,
    policy: Arc<dyn TerminalPolicy>,
    config: Arc<LoopConfig>,
    event_sink: Option<RunEventSink>,
}

impl LoopGraph {
    pub fn new(
        model: Arc<dyn ModelBackend>,
        tools: Arc<dyn ToolBackend>,
        catalogue: ToolCatalogue,
    ) -> Self {
        Self {
            model,
            tools,
            catalogue: Arc::new(catalogue),
            policy: Arc::new(NeverReturnDirectly),
            config: Arc::new(LoopConfig::default()),
            event_sink: None,
        }
    }

    /// Build with a registry as both tool backend and catalogue source.
    pub fn with_registry(model: Arc<dyn ModelBackend>, registry: ToolRegistry) -> Self {
        let catalogue = registry.catalogue();
        Self::new(model, Arc::new(registry), catalogue)
    }

    pub fn with_policy(mut self, policy: impl TerminalPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_event_sink(mut self, sink: RunEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn catalogue(&self) -> &ToolCatalogue {
        &self.catalogue
    }

    /// Run to completion with the seed conversation.
    pub async fn run(&self, seed: Vec<ModelMessage>) -> Result<RunOutcome, LoopError> {
        self.run_with_cancel(seed, &CancellationToken::new()).await
    }

    /// Run to completion; firing `cancel` ends the run with
    /// [`LoopError::Canceled`].
    pub async fn run_with_cancel(
        &self,
        seed: Vec<ModelMessage>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, LoopError> {
        self.run_as(Uuid::new_v4(), seed, cancel).await
    }

    /// Spawn the run on the tokio runtime.
    pub fn start(&self, seed: Vec<ModelMessage>) -> RunHandle {
        let run_id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (handle, result_tx) = RunHandle::new(run_id, cancel.clone());
        let graph = self.clone();
        tokio::spawn(async move {
            let result = graph.run_as(run_id, seed, &cancel).await;
            let _ = result_tx.send(result);
        });
        handle
    }

    async fn run_as(
        &self,
        run_id: RunId,
        seed: Vec<ModelMessage>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, LoopError> {
        let emitter = Arc::new(RunEventEmitter::new(run_id, self.event_sink.clone()));
        tracing::info!(
            run_id = %run_id,
            seed = seed.len(),
            max_steps = self.config.max_steps,
            "loop run start"
        );
        emitter.lifecycle(RunLifecycle::Started);

        let result = self.execute(seed, cancel, &emitter).await;
        match &result {
            Ok(outcome) => {
                tracing::info!(run_id = %run_id, steps = outcome.steps, "loop run completed");
                emitter.lifecycle(RunLifecycle::Completed);
            }
            Err(LoopError::Canceled) => {
                tracing::info!(run_id = %run_id, "loop run canceled");
                emitter.lifecycle(RunLifecycle::Canceled);
            }
            Err(err) => {
                tracing::warn!(
                    run_id = %run_id,
                    error = %err,
                    category = ?err.category(),
                    "loop run failed"
                );
                emitter.lifecycle(RunLifecycle::Failed {
                    error: err.to_string(),
                });
            }
        }
        tracing::debug!(run_id = %run_id, status = ?RunStatus::of(&result), "loop run finished");
        result
    }

    async fn execute(
        &self,
        seed: Vec<ModelMessage>,
        cancel: &CancellationToken,
        emitter: &Arc<RunEventEmitter>,
    ) -> Result<RunOutcome, LoopError> {
        self.config.validate()?;
        let idle_timeout = self.config.stream_idle_timeout();
        let model_step = ModelStep::new(Arc::clone(&self.model), Arc::clone(&self.catalogue))
            .with_streaming(self.config.streaming)
            .with_idle_timeout(idle_timeout);
        let tool_step = ToolStep::new(Arc::clone(&self.tools))
            .with_policy(Arc::clone(&self.policy))
            .with_streaming(self.config.tool_streaming)
            .with_idle_timeout(idle_timeout);

        let mut state = LoopState::with_capacity(self.config.history_capacity.max(seed.len()));
        let mut increment = seed;
        let mut latest_model: Option<ModelMessage> = None;
        let mut latest_batch = ToolOutput::default();
        let mut trace = Vec::new();
        let mut steps = 0;
        let mut node = LoopNode::Start;

        let message = loop {
            if node.is_step() {
                if cancel.is_cancelled() {
                    return Err(LoopError::Canceled);
                }
                if steps >= self.config.max_steps {
                    tracing::warn!(
                        run_id = %emitter.run_id(),
                        max_steps = self.config.max_steps,
                        next = %node,
                        "step bound reached"
                    );
                    return Err(LoopError::MaxStepsExceeded {
                        max_steps: self.config.max_steps,
                    });
                }
                steps += 1;
                tracing::debug!(run_id = %emitter.run_id(), step = steps, node = %node, "step start");
                emitter.emit(RunEventPayload::StepStarted { step: steps, node });
            }

            let next = match node {
                LoopNode::Start => LoopNode::ModelTurn,
                LoopNode::ModelTurn => {
                    let output = model_step
                        .run(&mut state, std::mem::take(&mut increment), cancel)
                        .await?;
                    let (route, message) = match output {
                        ModelOutput::Message(message) => (route_model_message(&message), message),
                        ModelOutput::Stream(stream) => {
                            let stream = self.observe_deltas(stream, emitter);
                            let (decide, assemble) = stream.fork();
                            let route = route_after_model(decide, cancel).await?;
                            let (message, usage) = assemble.into_message(cancel).await?;
                            if let Some(usage) = usage {
                                state.add_usage(&usage);
                            }
                            (route, message)
                        }
                    };
                    latest_model = Some(message);
                    LoopNode::from(route)
                }
                LoopNode::ToolTurn => {
                    let output = tool_step
                        .run_observed(
                            &mut state,
                            latest_model.take(),
                            cancel,
                            Some(emitter.as_ref()),
                        )
                        .await?;
                    let route = if self.config.streaming {
                        route_after_tools(output.stream(), &state)
                    } else {
                        route_tool_batch(&state)
                    };
                    latest_batch = output;
                    LoopNode::from(route)
                }
                LoopNode::DirectReturn => {
                    let call_id = state.terminal_call_id().unwrap_or_default();
                    let message = select_terminal(&latest_batch.results, call_id)?;
                    emitter.emit(RunEventPayload::StepCompleted { step: steps, node });
                    trace.push(node);
                    break message;
                }
                LoopNode::End => {
                    trace.push(node);
                    break latest_model.take().ok_or_else(|| {
                        LoopError::InvalidState("run ended without a model message".into())
                    })?;
                }
            };

            if node.is_step() {
                emitter.emit(RunEventPayload::StepCompleted { step: steps, node });
                trace.push(node);
            }
            tracing::debug!(run_id = %emitter.run_id(), from = %node, to = %next, "routed");
            emitter.emit(RunEventPayload::Routed { from: node, to: next });
            node = next;
        };

        let usage = state.usage().clone();
        Ok(RunOutcome {
            run_id: emitter.run_id(),
            message,
            history: state.into_history(),
            trace,
            steps,
            usage,
            finished_at: Utc::now(),
        })
    }

    fn observe_deltas(
        &self,
        stream: ChunkStream<MessageChunk>,
        emitter: &Arc<RunEventEmitter>,
    ) -> ChunkStream<MessageChunk> {
        if !emitter.is_enabled() {
            return stream;
        }
        let forward = Arc::clone(emitter);
        stream.inspect(move |chunk| {
            if !chunk.text.is_empty() {
                forward.emit(RunEventPayload::AssistantDelta {
                    text: chunk.text.clone(),
                });
            }
        })
    }
}

impl std::fmt::Debug for LoopGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopGraph")
            .field("model", &self.model.name())
            .field("tools", &self.catalogue.names())
            .field("config", &self.config)
            .finish()
    }
}
