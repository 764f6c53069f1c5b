//! Tests for the tool system.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use toolloop::backend::ToolBackend;
use toolloop::error::LoopError;
use toolloop::tools::builtin::{all_tools, analyze_difficulty, Difficulty};
use toolloop::tools::*;
use toolloop::types::AgentToolCall;

#[test]
fn parameter_builder_constructs_schema() {
    let params = AgentToolParameters::object()
        .string("expression", "Expression", true)
        .number("a", "First operand", false)
        .integer("precision", "Digits", false)
        .build();

    let schema = &params.schema;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["properties"]["expression"]["type"], "string");
    assert_eq!(schema["properties"]["a"]["type"], "number");
    assert_eq!(schema["properties"]["precision"]["type"], "integer");
    assert_eq!(params.required(), vec!["expression"]);
}

#[test]
fn parameter_builder_string_enum() {
    let params = AgentToolParameters::object()
        .string_enum("level", "Difficulty", &["easy", "medium", "hard"], true)
        .build();

    let enums = params.schema["properties"]["level"]["enum"]
        .as_array()
        .unwrap();
    assert_eq!(enums.len(), 3);
}

#[test]
fn empty_parameters() {
    let params = AgentToolParameters::empty();
    assert_eq!(params.schema["type"], "object");
    assert!(params.required().is_empty());
}

#[test]
fn tool_arguments_read_strings_and_numbers() {
    let args = ToolArguments::new(serde_json::json!({
        "expression": "183+192",
        "a": 42,
        "b": "0.5"
    }));
    assert_eq!(args.string("expression").unwrap(), "183+192");
    assert_eq!(args.number("a").unwrap(), 42.0);
    assert_eq!(args.number("b").unwrap(), 0.5);
    assert!(matches!(
        args.string("missing"),
        Err(LoopError::InvalidArgument(_))
    ));
    assert!(matches!(
        args.number("expression"),
        Err(LoopError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn closure_tool_runs_through_the_registry() {
    let definition = ToolDefinition::new(
        "greet",
        "Greet a person",
        AgentToolParameters::object()
            .string("name", "Name", true)
            .build(),
    );
    let tool: Arc<dyn Tool> = Arc::new(AgentTool::new(definition, |args, _ctx| async move {
        let name = args.string("name")?;
        Ok(serde_json::json!({"greeting": format!("Hello, {}!", name)}))
    }));
    assert_eq!(tool.name(), "greet");
    assert_eq!(tool.definition().description, "Greet a person");

    let registry = ToolRegistry::from_tools([tool]).unwrap();
    let encoded = serde_json::json!("{\"name\": \"World\"}");
    let call = AgentToolCall::new("call_1", "greet", encoded);
    let message = registry
        .invoke(&call, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(message.text(), "{\"greeting\":\"Hello, World!\"}");
}

#[test]
fn builtin_catalogue_keeps_registration_order() {
    let registry = ToolRegistry::from_tools(all_tools()).unwrap();
    let catalogue = registry.catalogue();
    assert_eq!(
        catalogue.names(),
        vec!["add", "subtract", "analyze_difficulty"]
    );
    assert_eq!(catalogue.get("add").unwrap().parameters.required(), vec!["a", "b"]);
}

#[test]
fn difficulty_grades_by_operators_and_width() {
    assert_eq!(analyze_difficulty("2+3").unwrap().difficulty, Difficulty::Easy);
    let report = analyze_difficulty("183+192-90").unwrap();
    assert_eq!(report.operators, 2);
    assert_eq!(report.max_digits, 3);
    assert_eq!(report.difficulty, Difficulty::Medium);
    assert_eq!(
        analyze_difficulty("12345*678+9").unwrap().difficulty,
        Difficulty::Hard
    );
    assert!(analyze_difficulty("two+2").is_err());
}

#[tokio::test]
async fn registry_answers_calls_with_tagged_results() {
    let registry = ToolRegistry::from_tools(all_tools()).unwrap();
    let call = AgentToolCall::new("call_1", "subtract", serde_json::json!({"a": 375, "b": 90}));

    let message = registry
        .invoke(&call, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(message.tool_call_id(), Some("call_1"));
    assert_eq!(message.text(), "285");
}

#[tokio::test]
async fn registry_attributes_argument_errors_to_the_tool() {
    let registry = ToolRegistry::from_tools(all_tools()).unwrap();
    let call = AgentToolCall::new("call_1", "add", serde_json::json!({"a": 1}));

    let err = registry
        .invoke(&call, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        LoopError::ToolExecution { tool_name, message } => {
            assert_eq!(tool_name, "add");
            assert!(message.contains("b"), "message: {message}");
        }
        other => panic!("expected tool execution error, got {other:?}"),
    }
}

#[tokio::test]
async fn registry_passes_cancellation_to_tools() {
    let definition =
        ToolDefinition::new("wait", "Wait until canceled", AgentToolParameters::empty());
    let waiter: Arc<dyn Tool> = Arc::new(AgentTool::new(definition, |_args, ctx| async move {
        ctx.cancel.cancelled().await;
        Ok(serde_json::json!("stopped"))
    }));
    let registry = ToolRegistry::from_tools([waiter]).unwrap();
    let cancel = CancellationToken::new();
    let call = AgentToolCall::new("call_1", "wait", serde_json::json!({}));

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        trigger.cancel();
    });

    let err = registry.invoke(&call, &cancel).await.unwrap_err();
    assert!(matches!(err, LoopError::Canceled));
}
