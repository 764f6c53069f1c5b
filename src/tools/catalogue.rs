//! The ordered set of tools offered to the model.

use serde::{Deserialize, Serialize};

use super::types::ToolDefinition;
use crate::error::LoopError;

/// Ordered, name-unique list of tool descriptors.
///
/// Built once when a graph is assembled and shared read-only by every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalogue {
    definitions: Vec<ToolDefinition>,
}

impl ToolCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from definitions, rejecting duplicate names.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = ToolDefinition>,
    ) -> Result<Self, LoopError> {
        let mut catalogue = Self::new();
        for definition in definitions {
            catalogue.push(definition)?;
        }
        Ok(catalogue)
    }

    /// Wrap definitions whose names are already known to be unique.
    pub(crate) fn from_unique(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        Self {
            definitions: definitions.into_iter().collect(),
        }
    }

    /// Append a definition. Names must be unique.
    pub fn push(&mut self, definition: ToolDefinition) -> Result<(), LoopError> {
        if self.contains(&definition.name) {
            return Err(LoopError::Configuration(format!(
                "duplicate tool name in catalogue: {}",
                definition.name
            )));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
