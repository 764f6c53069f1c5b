//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod catalogue;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use catalogue::ToolCatalogue;
pub use registry::ToolRegistry;
pub use tool::{AgentTool, Tool, ToolExecutionContext};
pub use types::{AgentToolParameters, ToolDefinition};
