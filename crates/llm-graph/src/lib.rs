//! # llm-graph
//!
//! A small execution graph for tool-using language model agents.
//!
//! A run starts from a seed message log and alternates between two
//! nodes until the model answers without requesting tools:
//!
//! ```text
//!   ┌────────────┐ assistant msg with tool calls ┌─────────────┐
//!   │ model node │ ────────────────────────────▶ │ tool stages │
//!   │  (Provider)│ ◀──────────────────────────── │(ToolRegistry)│
//!   └─────┬──────┘     every call answered       └─────────────┘
//!         │ assistant msg, no tool calls
//!         ▼
//!       done
//! ```
//!
//! The model node is any [`Provider`] (or `Arc<dyn DynProvider>`); the
//! `llm-graph-openai` crate supplies an OpenAI-compatible one. Tools are
//! [`ToolHandler`]s in a [`ToolRegistry`]. The log is append-only and
//! every tool call gets exactly one result, including calls to tools
//! that do not exist.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_graph::tool::{ToolError, tool_fn};
//! use llm_graph::{ChatMessage, DynProvider, ExecutionGraph, JsonSchema, ToolDefinition, ToolRegistry};
//! use serde_json::{Value, json};
//!
//! # async fn example(provider: Arc<dyn DynProvider>) -> Result<(), llm_graph::GraphError> {
//! let mut tools = ToolRegistry::new();
//! tools.register(tool_fn(
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
//!         Ok::<_, ToolError>(format!("Sunny in {}", input["city"].as_str().unwrap_or("?")))
//!     },
//! ));
//!
//! let graph = ExecutionGraph::new(provider, tools);
//! let run = graph
//!     .run(vec![ChatMessage::user("What's the weather in Paris?")], &())
//!     .await?;
//! println!("{}", run.final_text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chat`] | Messages, tool calls, tool results, responses |
//! | [`conversation`] | The append-only log and its pairing rules |
//! | [`error`] | [`LlmError`], [`GraphFailure`], [`GraphError`] |
//! | [`events`] | [`GraphEvent`]s and the [`EventSink`] channel |
//! | [`graph`] | [`ExecutionGraph`], configuration, summarizer, `run_channel` |
//! | [`invoker`] | [`ModelInvoker`]: one model call per turn |
//! | [`provider`] | The [`Provider`] trait and request parameters |
//! | [`router`] | [`RouterState`] and the pure `route` function |
//! | [`stream`] | Streaming events and response assembly |
//! | [`tool`] | Tool handlers, registry, dispatch |
//! | [`usage`] | Token counts |

#![warn(missing_docs)]

pub mod chat;
pub mod conversation;
pub mod error;
pub mod events;
pub mod graph;
pub mod invoker;
pub mod provider;
pub mod router;
pub mod stream;
pub mod tool;
pub mod usage;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

pub use chat::{ChatMessage, ChatResponse, ChatRole, MessageContent, StopReason, ToolCall, ToolResult};
pub use conversation::{ConversationState, MessageLog};
pub use error::{GraphError, GraphFailure, LlmError};
pub use events::{EventSink, GraphEvent};
pub use graph::{ExecutionGraph, GraphBuilder, GraphConfig, GraphRun, RunControl};
pub use invoker::ModelInvoker;
pub use provider::{
    ChatParams, DynProvider, JsonSchema, Provider, ProviderMetadata, ToolChoice, ToolDefinition,
};
pub use router::{RouterState, ToolSelector};
pub use stream::{ChatStream, StreamEvent};
pub use tool::{ToolHandler, ToolRegistry};
pub use usage::Usage;
