//! Per-run shared state.

use crate::types::{ModelMessage, Usage};

/// Mutable record shared by the steps of one run.
///
/// Only the model and tool steps append to `history`, and only the tool step
/// sets the terminal call id; both writers are crate-private. The executor
/// owns the state and lends it to one step at a time.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    history: Vec<ModelMessage>,
    terminal_call_id: Option<String>,
    usage: Usage,
}

impl LoopState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            history: Vec::with_capacity(capacity),
            ..Default::default()
        }
    }

    pub fn history(&self) -> &[ModelMessage] {
        &self.history
    }

    /// An owned copy of the history, safe to hand to a backend.
    pub fn snapshot(&self) -> Vec<ModelMessage> {
        self.history.clone()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn last(&self) -> Option<&ModelMessage> {
        self.history.last()
    }

    /// The pending early-exit call id, if any.
    pub fn terminal_call_id(&self) -> Option<&str> {
        self.terminal_call_id.as_deref()
    }

    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    pub(crate) fn append(&mut self, message: ModelMessage) {
        self.history.push(message);
    }

    pub(crate) fn extend(&mut self, messages: impl IntoIterator<Item = ModelMessage>) {
        self.history.extend(messages);
    }

    /// Empty ids count as "no early exit".
    pub(crate) fn set_terminal_call_id(&mut self, call_id: Option<String>) {
        self.terminal_call_id = call_id.filter(|id| !id.is_empty());
    }

    pub(crate) fn add_usage(&mut self, usage: &Usage) {
        self.usage.merge(usage);
    }

    pub(crate) fn into_history(self) -> Vec<ModelMessage> {
        self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn history_only_grows_and_snapshots_are_detached() {
        let mut state = LoopState::with_capacity(12);
        state.extend([ModelMessage::system("sys"), ModelMessage::user("hi")]);
        let snapshot = state.snapshot();

        state.append(ModelMessage::assistant("hello"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(state.len(), 3);
        assert_eq!(&state.history()[..2], snapshot.as_slice());
        assert_eq!(state.last().map(|m| m.text()), Some("hello".to_string()));
    }

    #[test]
    fn empty_terminal_id_means_none() {
        let mut state = LoopState::default();
        state.set_terminal_call_id(Some(String::new()));
        assert_eq!(state.terminal_call_id(), None);
        state.set_terminal_call_id(Some("call_1".into()));
        assert_eq!(state.terminal_call_id(), Some("call_1"));
        state.set_terminal_call_id(None);
        assert_eq!(state.terminal_call_id(), None);
    }
}
