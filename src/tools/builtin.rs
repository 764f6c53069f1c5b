//! Built-in arithmetic tools.
//!
//! `add` and `subtract` take two numbers `a` and `b`; `analyze_difficulty`
//! grades an arithmetic expression for a young learner. Each tool is built
//! with [`AgentTool::new`] and returned as `Arc<dyn Tool>`.
//!
//! ```rust
//! use toolloop::tools::builtin::all_tools;
//!
//! let tools = all_tools();
//! assert_eq!(tools.len(), 3);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::LoopError;
use crate::tools::tool::{AgentTool, Tool};
use crate::tools::types::{AgentToolParameters, ToolDefinition};

const OPERATORS: [char; 4] = ['+', '-', '*', '/'];

/// Whole results are reported as integers, everything else as floats.
fn number_value(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serde_json::json!(value as i64)
    } else {
        serde_json::json!(value)
    }
}

/// A tool over two numeric operands `a` and `b`.
fn binary_tool(name: &str, description: &str, op: fn(f64, f64) -> f64) -> Arc<dyn Tool> {
    let definition = ToolDefinition::new(
        name,
        description,
        AgentToolParameters::object()
            .number("a", "The first operand", true)
            .number("b", "The second operand", true)
            .build(),
    );
    Arc::new(AgentTool::new(definition, move |args, _ctx| async move {
        Ok(number_value(op(args.number("a")?, args.number("b")?)))
    }))
}

/// Create the `add` tool: returns `a + b`.
pub fn add_tool() -> Arc<dyn Tool> {
    binary_tool("add", "Add two numbers and return the sum", |a, b| a + b)
}

/// Create the `subtract` tool: returns `a - b`.
pub fn subtract_tool() -> Arc<dyn Tool> {
    binary_tool(
        "subtract",
        "Subtract the second number from the first and return the difference",
        |a, b| a - b,
    )
}

/// How hard an expression is for a beginner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Grading of one expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyReport {
    pub expression: String,
    pub operators: usize,
    pub max_digits: usize,
    pub score: usize,
    pub difficulty: Difficulty,
}

/// Grade an expression: operator count plus the digit count of its widest
/// operand. Up to 3 is easy, up to 5 medium, anything above hard.
pub fn analyze_difficulty(expression: &str) -> Result<DifficultyReport, LoopError> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(LoopError::InvalidArgument("expression is empty".into()));
    }

    let operators = expression.chars().filter(|c| OPERATORS.contains(c)).count();
    let mut max_digits = 0;
    for operand in expression.split(|c| OPERATORS.contains(&c)) {
        let operand = operand.trim();
        if operand.is_empty() {
            continue;
        }
        if operand.parse::<f64>().is_err() {
            return Err(LoopError::InvalidArgument(format!(
                "not a number: {operand}"
            )));
        }
        max_digits = max_digits.max(operand.chars().filter(char::is_ascii_digit).count());
    }

    let score = operators + max_digits;
    let difficulty = match score {
        0..=3 => Difficulty::Easy,
        4..=5 => Difficulty::Medium,
        _ => Difficulty::Hard,
    };
    Ok(DifficultyReport {
        expression: expression.to_string(),
        operators,
        max_digits,
        score,
        difficulty,
    })
}

/// Create the `analyze_difficulty` tool.
pub fn analyze_difficulty_tool() -> Arc<dyn Tool> {
    let definition = ToolDefinition::new(
        "analyze_difficulty",
        "Classify an arithmetic expression as easy, medium, or hard",
        AgentToolParameters::object()
            .string("expression", "The arithmetic expression, e.g. 12+7", true)
            .build(),
    );
    Arc::new(AgentTool::new(definition, |args, _ctx| async move {
        let report = analyze_difficulty(args.string("expression")?)?;
        Ok(serde_json::to_value(report)?)
    }))
}

/// Return all built-in tools.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![add_tool(), subtract_tool(), analyze_difficulty_tool()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::arguments::ToolArguments;
    use crate::tools::tool::ToolExecutionContext;
    use crate::types::AgentToolCall;
    use tokio_util::sync::CancellationToken;

    async fn run(
        tool: Arc<dyn Tool>,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, LoopError> {
        let call = AgentToolCall::new("call_test", tool.name(), args.clone());
        let ctx = ToolExecutionContext::for_call(&call, &CancellationToken::new());
        tool.run(ToolArguments::new(args), ctx).await
    }

    #[tokio::test]
    async fn add_and_subtract_return_integers_for_whole_results() {
        let sum = run(add_tool(), serde_json::json!({"a": 183, "b": 192}))
            .await
            .unwrap();
        assert_eq!(sum, serde_json::json!(375));

        let diff = run(subtract_tool(), serde_json::json!({"a": 375, "b": 90}))
            .await
            .unwrap();
        assert_eq!(diff, serde_json::json!(285));
    }

    #[tokio::test]
    async fn add_accepts_fractions_and_numeric_strings() {
        let sum = run(add_tool(), serde_json::json!({"a": "1.5", "b": 2}))
            .await
            .unwrap();
        assert_eq!(sum, serde_json::json!(3.5));
    }

    #[tokio::test]
    async fn missing_operand_is_invalid_argument() {
        let err = run(add_tool(), serde_json::json!({"a": 1}))
            .await
            .unwrap_err();
        assert!(matches!(err, LoopError::InvalidArgument(_)));
    }

    #[test]
    fn grades_expressions() {
        assert_eq!(analyze_difficulty("1+2").unwrap().difficulty, Difficulty::Easy);
        let report = analyze_difficulty("183+192-90").unwrap();
        assert_eq!(report.operators, 2);
        assert_eq!(report.max_digits, 3);
        assert_eq!(report.difficulty, Difficulty::Medium);
        assert_eq!(
            analyze_difficulty("12345*678-9").unwrap().difficulty,
            Difficulty::Hard
        );
    }

    #[test]
    fn rejects_non_numeric_operands() {
        assert!(analyze_difficulty("1+x").is_err());
        assert!(analyze_difficulty("   ").is_err());
    }

    #[tokio::test]
    async fn difficulty_tool_reports_label() {
        let value = run(
            analyze_difficulty_tool(),
            serde_json::json!({"expression": "183+192-90"}),
        )
        .await
        .unwrap();
        assert_eq!(value["difficulty"], "medium");
        assert_eq!(value["score"], 5);
    }
}
