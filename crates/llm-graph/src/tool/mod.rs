//! Tool registry and execution.
//!
//! ```text
//!   ToolHandler     one tool: definition (name, schema) + execute fn
//!       │
//!   ToolRegistry    handlers by exact name; validates and dispatches
//!       │
//!   dispatch()      a whole batch, concurrent, results in call order
//! ```
//!
//! Tool failures never abort a batch. Each call yields exactly one
//! [`ToolResult`](crate::ToolResult); an unknown name, invalid
//! arguments, a handler error or a timeout becomes a result with
//! `success = false` whose content is the [`DispatchError`] text.
//!
//! # Example
//!
//! ```rust
//! use llm_graph::tool::{ToolRegistry, tool_fn};
//! use llm_graph::{JsonSchema, ToolCall, ToolDefinition};
//! use serde_json::{Value, json};
//!
//! # async fn example() {
//! let mut registry: ToolRegistry = ToolRegistry::new();
//! registry.register(tool_fn(
//!     ToolDefinition::new(
//!         "get_weather",
//!         "Current weather for a city",
//!         JsonSchema::new(json!({
//!             "type": "object",
//!             "properties": { "city": { "type": "string" } },
//!             "required": ["city"]
//!         })),
//!     ),
//!     |input: Value| async move {
//!         Ok(format!("Sunny in {}", input["city"].as_str().unwrap_or("?")))
//!     },
//! ));
//!
//! let calls = vec![
//!     ToolCall { id: "1".into(), name: "get_weather".into(), arguments: json!({"city": "Paris"}) },
//!     ToolCall { id: "2".into(), name: "teleport".into(), arguments: json!({}) },
//! ];
//! let results = registry.dispatch(&calls, &(), true).await;
//! assert!(results[0].success);
//! assert!(!results[1].success);
//! # }
//! ```

mod error;
pub(crate) mod execution;
mod handler;
mod helpers;
mod output;
mod registry;

pub use error::{DispatchError, ToolError};
pub use handler::{FnToolHandler, NoCtxToolHandler, SyncToolHandler, ToolFuture, ToolHandler};
pub use helpers::{tool_fn, tool_fn_sync, tool_fn_with_ctx};
pub use output::ToolOutput;
pub use registry::ToolRegistry;

#[cfg(test)]
mod tests;
