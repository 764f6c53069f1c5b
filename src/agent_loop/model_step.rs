//! The model turn.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state::LoopState;
use crate::backend::{ModelBackend, ModelOutput, ModelRequest};
use crate::error::LoopError;
use crate::tools::ToolCatalogue;
use crate::types::ModelMessage;
use crate::util::with_cancel;

/// Calls the model backend with the accumulated conversation.
#[derive(Clone)]
pub struct ModelStep {
    backend: Arc<dyn ModelBackend>,
    catalogue: Arc<ToolCatalogue>,
    streaming: bool,
    idle_timeout: Option<Duration>,
}

impl ModelStep {
    pub fn new(backend: Arc<dyn ModelBackend>, catalogue: Arc<ToolCatalogue>) -> Self {
        Self {
            backend,
            catalogue,
            streaming: true,
            idle_timeout: None,
        }
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Append `increment` to history, then ask the backend for the next
    /// message given a copy of history and the catalogue.
    ///
    /// Backend errors are returned as-is.
    pub async fn run(
        &self,
        state: &mut LoopState,
        increment: Vec<ModelMessage>,
        cancel: &CancellationToken,
    ) -> Result<ModelOutput, LoopError> {
        state.extend(increment);
        let request = ModelRequest {
            messages: state.snapshot(),
            tools: self.catalogue.definitions().to_vec(),
        };
        debug!(
            backend = self.backend.name(),
            messages = request.messages.len(),
            tools = request.tools.len(),
            streaming = self.streaming,
            "model turn"
        );

        if self.streaming {
            let stream = with_cancel(cancel, self.backend.stream(&request, cancel)).await?;
            Ok(ModelOutput::Stream(stream.with_idle_timeout(self.idle_timeout)))
        } else {
            let message = with_cancel(cancel, self.backend.generate(&request, cancel)).await?;
            Ok(ModelOutput::Message(message))
        }
    }
}

impl std::fmt::Debug for ModelStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStep")
            .field("backend", &self.backend.name())
            .field("tools", &self.catalogue.names())
            .field("streaming", &self.streaming)
            .finish()
    }
}
