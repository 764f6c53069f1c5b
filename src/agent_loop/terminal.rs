//! Direct-return selection.

use crate::error::LoopError;
use crate::types::ModelMessage;

/// Pick the message of `batch` answering `call_id`, unchanged.
///
/// A miss means the early-exit policy named a call outside its own batch;
/// it fails with [`LoopError::NoValue`].
pub fn select_terminal(batch: &[ModelMessage], call_id: &str) -> Result<ModelMessage, LoopError> {
    batch
        .iter()
        .find(|message| message.tool_call_id() == Some(call_id))
        .cloned()
        .ok_or_else(|| LoopError::NoValue {
            call_id: call_id.to_string(),
        })
}
