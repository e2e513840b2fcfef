//! Tests for the tool module.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};

use super::execution::{DispatchOptions, execute_batch};
use super::*;
use crate::chat::{MessageContent, ToolCall};
use crate::events::{EventSink, GraphEvent};
use crate::provider::{JsonSchema, ToolDefinition};

fn number_schema() -> JsonSchema {
    JsonSchema::new(json!({
        "type": "object",
        "properties": {
            "a": {"type": "number"},
            "b": {"type": "number"}
        },
        "required": ["a", "b"]
    }))
}

fn object_schema() -> JsonSchema {
    JsonSchema::new(json!({"type": "object"}))
}

fn call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

/// Adds two numbers.
struct AddTool;

impl ToolHandler<()> for AddTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("add", "Add two numbers", number_schema())
    }

    fn execute<'a>(&'a self, input: Value, _ctx: &'a ()) -> ToolFuture<'a> {
        Box::pin(async move {
            let a = input["a"].as_f64().unwrap_or(0.0);
            let b = input["b"].as_f64().unwrap_or(0.0);
            Ok(ToolOutput::new(format!("{}", a + b)))
        })
    }
}

/// Always fails.
struct FailTool;

impl ToolHandler<()> for FailTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("fail", "Always fails", object_schema())
    }

    fn execute<'a>(&'a self, _input: Value, _ctx: &'a ()) -> ToolFuture<'a> {
        Box::pin(async move { Err(ToolError::new("intentional failure")) })
    }
}

/// One async tool that sleeps for `ms` then echoes `tag`.
fn sleep_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(tool_fn(
        ToolDefinition::new(
            "sleep",
            "Sleep then echo",
            JsonSchema::new(json!({
                "type": "object",
                "properties": {"ms": {"type": "integer"}, "tag": {"type": "string"}},
                "required": ["ms", "tag"]
            })),
        ),
        |input: Value| async move {
            let ms = input["ms"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(input["tag"].as_str().unwrap_or_default().to_owned())
        },
    ));
    registry
}

// ── ToolHandler ─────────────────────────────────────────────────

#[test]
fn test_tool_handler_is_object_safe() {
    fn assert_object_safe(_: &dyn ToolHandler<()>) {}
    assert_object_safe(&AddTool);
}

#[test]
fn test_tool_error_display() {
    let err = ToolError::new("something broke");
    assert_eq!(format!("{err}"), "something broke");
}

#[tokio::test]
async fn test_tool_handler_execute() {
    let result = AddTool.execute(json!({"a": 2, "b": 3}), &()).await.unwrap();
    assert_eq!(result.content, MessageContent::Text("5".into()));
}

#[tokio::test]
async fn test_tool_fn_with_ctx_reads_context() {
    struct Ctx {
        region: String,
    }
    let handler = tool_fn_with_ctx(
        ToolDefinition::new("region", "Region", object_schema()),
        |_input: Value, ctx: &Ctx| {
            let region = ctx.region.clone();
            async move { Ok(ToolOutput::new(region)) }
        },
    );
    let ctx = Ctx {
        region: "eu-west".into(),
    };
    let out = handler.execute(json!({}), &ctx).await.unwrap();
    assert_eq!(out.content.as_text(), Some("eu-west"));
}

#[tokio::test]
async fn test_tool_fn_sync_is_non_suspending() {
    let handler = tool_fn_sync(
        ToolDefinition::new("add", "Add", number_schema()),
        |input: Value| Ok(json!(input["a"].as_i64().unwrap_or(0) + input["b"].as_i64().unwrap_or(0))),
    );
    assert!(!ToolHandler::<()>::definition(&handler).may_suspend);
    let out = ToolHandler::<()>::execute(&handler, json!({"a": 1, "b": 2}), &())
        .await
        .unwrap();
    assert_eq!(out.content, MessageContent::Json(json!(3)));
}

// ── ToolRegistry ────────────────────────────────────────────────

#[test]
fn test_registry_register_and_lookup() {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool).register(FailTool);
    assert_eq!(registry.len(), 2);
    assert!(registry.contains("add"));
    assert!(registry.get("fail").is_some());
    assert!(registry.get("missing").is_none());
}

#[test]
fn test_registry_replaces_same_name() {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool);
    registry.register(tool_fn(
        ToolDefinition::new("add", "Replacement", number_schema()),
        |_input: Value| async { Ok("0") },
    ));
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.definitions()[0].description, "Replacement");
}

#[test]
fn test_registry_definitions_sorted() {
    let mut registry = ToolRegistry::new();
    registry.register(FailTool).register(AddTool);
    let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
    assert_eq!(names, ["add", "fail"]);
}

#[test]
fn test_registry_without_and_only() {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool).register(FailTool);
    let without = registry.without(["fail"]);
    assert!(without.contains("add"));
    assert!(!without.contains("fail"));
    let only = registry.only(["fail"]);
    assert_eq!(only.len(), 1);
    assert!(only.contains("fail"));
}

#[tokio::test]
async fn test_execute_unknown_tool_is_error_result() {
    let registry: ToolRegistry = ToolRegistry::new();
    let result = registry.execute(&call("c1", "nope", json!({})), &()).await;
    assert!(!result.success);
    assert_eq!(result.tool_call_id, "c1");
    assert_eq!(result.error.as_deref(), Some("Unknown tool: nope"));
}

#[tokio::test]
async fn test_execute_handler_failure_is_error_result() {
    let mut registry = ToolRegistry::new();
    registry.register(FailTool);
    let result = registry.execute(&call("c1", "fail", json!({})), &()).await;
    assert!(!result.success);
    assert!(result.content.to_text().contains("intentional failure"));
}

#[cfg(feature = "schema")]
#[tokio::test]
async fn test_execute_invalid_arguments_rejected_before_handler() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = ToolRegistry::new();
    registry.register(tool_fn(
        ToolDefinition::new("add", "Add", number_schema()),
        move |_input: Value| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok("ran") }
        },
    ));
    let result = registry
        .execute(&call("c1", "add", json!({"a": "one"})), &())
        .await;
    assert!(!result.success);
    assert!(result.content.to_text().contains("Invalid arguments for tool 'add'"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invoke_reports_dispatch_error_kind() {
    let mut registry = ToolRegistry::new();
    registry.register(FailTool);
    let err = registry.invoke("fail", json!({}), &()).await.unwrap_err();
    assert!(matches!(err, DispatchError::Execution { .. }));
    let err = registry.invoke("ghost", json!({}), &()).await.unwrap_err();
    assert!(matches!(err, DispatchError::UnknownTool { .. }));
}

// ── dispatch ────────────────────────────────────────────────────

#[tokio::test]
async fn test_dispatch_partial_failure_keeps_order() {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool);
    let calls = [
        call("c1", "does_not_exist", json!({})),
        call("c2", "add", json!({"a": 1, "b": 1})),
    ];
    let results = registry.dispatch(&calls, &(), true).await;
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tool_call_id, "c1");
    assert!(!results[0].success);
    assert_eq!(results[1].tool_call_id, "c2");
    assert!(results[1].success);
    assert_eq!(results[1].content.as_text(), Some("2"));
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_reassembles_call_order() {
    let registry = sleep_registry();
    let calls = [
        call("slow", "sleep", json!({"ms": 300, "tag": "slow"})),
        call("mid", "sleep", json!({"ms": 200, "tag": "mid"})),
        call("fast", "sleep", json!({"ms": 100, "tag": "fast"})),
    ];
    let results = registry.dispatch(&calls, &(), true).await;
    let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
    assert_eq!(ids, ["slow", "mid", "fast"]);
    let tags: Vec<_> = results.iter().map(|r| r.content.to_text()).collect();
    assert_eq!(tags, ["slow", "mid", "fast"]);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_parallel_overlaps_suspending_calls() {
    let registry = sleep_registry();
    let calls: Vec<_> = (0..4)
        .map(|i| call(&format!("c{i}"), "sleep", json!({"ms": 100, "tag": "t"})))
        .collect();

    let start = tokio::time::Instant::now();
    registry.dispatch(&calls, &(), true).await;
    assert!(start.elapsed() < Duration::from_millis(200));

    let start = tokio::time::Instant::now();
    registry.dispatch(&calls, &(), false).await;
    assert!(start.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_dispatch_same_batch_twice_is_idempotent_for_pure_tool() {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool);
    let calls = [
        call("c1", "add", json!({"a": 2, "b": 3})),
        call("c2", "add", json!({"a": 10, "b": -4})),
    ];
    let first = registry.dispatch(&calls, &(), true).await;
    let second = registry.dispatch(&calls, &(), true).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_dispatch_mixes_sync_and_async_tools() {
    let mut registry = sleep_registry();
    registry.register(tool_fn_sync(
        ToolDefinition::new("echo", "Echo", object_schema()),
        |input: Value| Ok(input),
    ));
    let calls = [
        call("a", "sleep", json!({"ms": 5, "tag": "async"})),
        call("b", "echo", json!({"x": 1})),
    ];
    let results = registry.dispatch(&calls, &(), true).await;
    assert_eq!(results[0].content.to_text(), "async");
    assert_eq!(results[1].content, MessageContent::Json(json!({"x": 1})));
}

#[tokio::test]
async fn test_dispatch_empty_batch() {
    let registry: ToolRegistry = ToolRegistry::new();
    assert!(registry.dispatch(&[], &(), true).await.is_empty());
}

// ── execute_batch ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_execute_batch_times_out_suspending_tool() {
    let registry = sleep_registry();
    let options = DispatchOptions {
        parallel: true,
        max_concurrency: 4,
        tool_timeout: Some(Duration::from_millis(50)),
    };
    let calls = vec![
        (0, call("quick", "sleep", json!({"ms": 10, "tag": "ok"}))),
        (1, call("stuck", "sleep", json!({"ms": 10_000, "tag": "late"}))),
    ];
    let results = execute_batch(&registry, calls, &(), &options, &EventSink::none()).await;
    assert!(results[0].1.success);
    assert!(!results[1].1.success);
    assert!(results[1].1.content.to_text().contains("timed out"));
}

#[tokio::test]
async fn test_execute_batch_emits_start_and_end_per_call() {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool);
    let options = DispatchOptions {
        parallel: false,
        max_concurrency: 1,
        tool_timeout: None,
    };
    let (sink, mut rx) = EventSink::channel(16);
    let calls = vec![
        (0, call("c1", "add", json!({"a": 1, "b": 2}))),
        (1, call("c2", "missing", json!({}))),
    ];
    execute_batch(&registry, calls, &(), &options, &sink).await;
    drop(sink);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert_eq!(events.len(), 4);
    let starts = events
        .iter()
        .filter(|e| matches!(e, GraphEvent::ToolStart { .. }))
        .count();
    assert_eq!(starts, 2);
    assert!(events.iter().any(|e| matches!(
        e,
        GraphEvent::ToolEnd { call_id, result, .. } if call_id == "c2" && !result.success
    )));
}
