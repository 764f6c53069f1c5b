//! Error types for toolloop.

pub mod unified;

pub use unified::ErrorCategory;

use thiserror::Error;

/// Primary error type for all loop operations.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Model backend error ({backend}): {message}")]
    ModelBackend { backend: String, message: String },

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The terminal call id does not match any message of the latest tool batch.
    #[error("no value produced: no tool result answers call '{call_id}'")]
    NoValue { call_id: String },

    #[error("max steps exceeded: loop did not converge within {max_steps} steps")]
    MaxStepsExceeded { max_steps: usize },

    #[error("run canceled")]
    Canceled,

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl LoopError {
    /// Create a model backend error.
    pub fn model(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelBackend {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ModelBackend { .. }
            | Self::ToolExecution { .. }
            | Self::ToolNotFound(_)
            | Self::InvalidArgument(_)
            | Self::Stream(_)
            | Self::Io(_) => ErrorCategory::Backend,
            Self::NoValue { .. } => ErrorCategory::Invariant,
            Self::MaxStepsExceeded { .. } => ErrorCategory::NonConvergence,
            Self::Canceled => ErrorCategory::Cancellation,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether the caller gave up, as opposed to something failing.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Whether a model or tool backend call failed.
    pub fn is_backend_failure(&self) -> bool {
        self.category() == ErrorCategory::Backend
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LoopError>;
