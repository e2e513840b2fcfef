//! Helper functions for creating tool handlers.

use std::future::Future;
use std::marker::PhantomData;

use serde_json::Value;

use super::{FnToolHandler, NoCtxToolHandler, SyncToolHandler, ToolError, ToolOutput};
use crate::provider::ToolDefinition;

/// Creates a [`ToolHandler`](super::ToolHandler) from an async closure
/// that ignores the context.
///
/// The closure returns `Result<impl Into<ToolOutput>, ToolError>`, so
/// `String`, `&str` and `serde_json::Value` outputs all work.
///
/// ```rust
/// use llm_graph::tool::{ToolRegistry, tool_fn};
/// use llm_graph::{JsonSchema, ToolDefinition};
/// use serde_json::{Value, json};
///
/// let mut registry: ToolRegistry = ToolRegistry::new();
/// registry.register(tool_fn(
///     ToolDefinition::new(
///         "get_weather",
///         "Current weather for a city",
///         JsonSchema::new(json!({
///             "type": "object",
///             "properties": { "city": { "type": "string" } },
///             "required": ["city"]
///         })),
///     ),
///     |input: Value| async move {
///         let city = input["city"].as_str().unwrap_or("unknown").to_owned();
///         Ok(format!("Sunny in {city}"))
///     },
/// ));
/// assert!(registry.contains("get_weather"));
/// ```
pub fn tool_fn<F, Fut, O>(definition: ToolDefinition, handler: F) -> NoCtxToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Into<ToolOutput> + Send + 'static,
{
    NoCtxToolHandler {
        definition,
        handler,
    }
}

/// Creates a [`ToolHandler<Ctx>`](super::ToolHandler) from an async
/// closure that receives the run context.
///
/// ```rust
/// use llm_graph::tool::{ToolOutput, tool_fn_with_ctx};
/// use llm_graph::{JsonSchema, ToolDefinition};
/// use serde_json::{Value, json};
///
/// struct AppContext {
///     region: String,
/// }
///
/// let handler = tool_fn_with_ctx(
///     ToolDefinition::new("region", "Deployment region", JsonSchema::new(json!({"type": "object"}))),
///     |_input: Value, ctx: &AppContext| {
///         let region = ctx.region.clone();
///         async move { Ok(ToolOutput::new(region)) }
///     },
/// );
/// ```
pub fn tool_fn_with_ctx<Ctx, F, Fut, O>(
    definition: ToolDefinition,
    handler: F,
) -> FnToolHandler<Ctx, F>
where
    Ctx: Send + Sync + 'static,
    F: for<'c> Fn(Value, &'c Ctx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, ToolError>> + Send + 'static,
    O: Into<ToolOutput> + Send + 'static,
{
    FnToolHandler {
        definition,
        handler,
        _ctx: PhantomData,
    }
}

/// Creates a synchronous, non-suspending tool from a plain closure.
///
/// The definition is marked non-suspending, so the registry runs it
/// inline instead of scheduling it with the concurrent calls of a batch.
///
/// ```rust
/// use llm_graph::tool::tool_fn_sync;
/// use llm_graph::{JsonSchema, ToolDefinition};
/// use serde_json::{Value, json};
///
/// let add = tool_fn_sync(
///     ToolDefinition::new("add", "Add two numbers", JsonSchema::new(json!({"type": "object"}))),
///     |input: Value| {
///         let a = input["a"].as_f64().unwrap_or(0.0);
///         let b = input["b"].as_f64().unwrap_or(0.0);
///         Ok(json!(a + b))
///     },
/// );
/// ```
pub fn tool_fn_sync<F, O>(definition: ToolDefinition, handler: F) -> SyncToolHandler<F>
where
    F: Fn(Value) -> Result<O, ToolError> + Send + Sync + 'static,
    O: Into<ToolOutput>,
{
    SyncToolHandler {
        definition: definition.non_suspending(),
        handler,
    }
}
