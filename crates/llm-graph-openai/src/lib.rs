//! OpenAI-compatible model backend for `llm-graph`.
//!
//! Implements [`Provider`](llm_graph::Provider) over the Chat Completions
//! API. Any server that speaks the same wire format works: point
//! [`OpenAiConfig::base_url`] at it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_graph::{ChatMessage, ExecutionGraph, ToolRegistry};
//! use llm_graph_openai::{OpenAiConfig, OpenAiProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Reads SILICONFLOW_API_KEY, SILICONFLOW_BASE_URL and SILICONFLOW_MODEL.
//! let config = OpenAiConfig::from_env_prefixed("SILICONFLOW")?;
//! let provider = Arc::new(OpenAiProvider::new(config)?);
//!
//! let graph = ExecutionGraph::new(provider, ToolRegistry::new());
//! let run = graph
//!     .run(vec![ChatMessage::user("What is the capital of France?")], &())
//!     .await?;
//! println!("{}", run.final_text().unwrap_or_default());
//! # Ok(())
//! # }
//! ```
//!
//! Streaming responses are parsed from server-sent events, including
//! tool call arguments that arrive in fragments.

#![warn(missing_docs)]

mod config;
mod convert;
mod provider;
mod stream;
mod types;

pub use config::OpenAiConfig;
pub use provider::OpenAiProvider;
