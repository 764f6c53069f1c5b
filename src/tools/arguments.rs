//! Reading a tool call's arguments.

use serde_json::Value;

use crate::error::LoopError;

/// The decoded arguments of one tool call.
///
/// Accessor names mirror the schema builder: a property declared with
/// [`string`](super::types::ParameterBuilder::string) is read with
/// [`string`](Self::string), and likewise for numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    /// Models sometimes encode the argument object as a JSON string; that
    /// string is parsed here, and a blank one means no arguments.
    pub fn new(value: Value) -> Self {
        let value = match value {
            Value::String(raw) if raw.trim().is_empty() => Value::Object(Default::default()),
            Value::String(raw) => serde_json::from_str(raw.trim()).unwrap_or(Value::String(raw)),
            other => other,
        };
        Self { value }
    }

    fn field(&self, key: &str) -> Result<&Value, LoopError> {
        self.value
            .get(key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| LoopError::InvalidArgument(format!("missing argument '{key}'")))
    }

    pub fn string(&self, key: &str) -> Result<&str, LoopError> {
        self.field(key)?.as_str().ok_or_else(|| {
            LoopError::InvalidArgument(format!("argument '{key}' must be a string"))
        })
    }

    /// A numeric argument. Quoted numbers such as `"1.5"` are accepted.
    pub fn number(&self, key: &str) -> Result<f64, LoopError> {
        let parsed = match self.field(key)? {
            Value::String(s) => s.trim().parse().ok(),
            other => other.as_f64(),
        };
        parsed.ok_or_else(|| {
            LoopError::InvalidArgument(format!("argument '{key}' must be a number"))
        })
    }
}
