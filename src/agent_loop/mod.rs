//! The model/tool loop: shared state, steps, routing, and the executor.

pub mod branch;
pub mod events;
pub mod graph;
pub mod model_step;
pub mod state;
pub mod terminal;
pub mod tool_step;
pub mod types;

pub use branch::*;
pub use events::{RunEvent, RunEventPayload, RunEventSink, RunLifecycle};
pub use graph::{LoopGraph, LoopNode};
pub use model_step::ModelStep;
pub use state::LoopState;
pub use terminal::select_terminal;
pub use tool_step::*;
pub use types::*;
