//! toolloop: a streaming model/tool calling loop as an explicit state machine.
//!
//! A [`LoopGraph`](agent_loop::LoopGraph) alternates model turns and tool
//! turns. After each model turn the reply stream is inspected until it shows
//! either tool calls (run them) or content (finish). After each tool turn a
//! pluggable [`TerminalPolicy`](agent_loop::TerminalPolicy) may hand one tool
//! result straight back to the caller. Runs are bounded by a step limit,
//! honor cancellation at every await point, and always release their streams.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolloop::prelude::*;
//! use toolloop::tools::builtin::all_tools;
//!
//! # async fn example(model: Arc<dyn ModelBackend>) -> toolloop::error::Result<()> {
//! let registry = ToolRegistry::from_tools(all_tools())?;
//! let graph = LoopGraph::with_registry(model, registry);
//! let outcome = graph
//!     .run(vec![ModelMessage::user("What is 183+192-90?")])
//!     .await?;
//! println!("{}", outcome.message.text());
//! # Ok(())
//! # }
//! ```

pub mod agent_loop;
pub mod backend;
pub mod config;
pub mod error;
pub mod prelude;
pub mod stream;
pub mod tools;
pub mod types;
pub mod util;
