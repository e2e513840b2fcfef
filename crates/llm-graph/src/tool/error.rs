//! Tool error types.

use std::time::Duration;

/// Error returned by a tool handler.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    /// Human-readable error description.
    pub message: String,
}

impl ToolError {
    /// Creates a new tool error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Why a single tool call produced an error result.
///
/// None of these abort a run. The registry renders them into a
/// [`ToolResult`](crate::ToolResult) with `success = false` so the model
/// can react, and the rest of the batch proceeds.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DispatchError {
    /// No handler is registered under the requested name.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// The name the model asked for.
        name: String,
    },

    /// The arguments do not match the tool's parameter schema.
    #[error("Invalid arguments for tool '{name}': {message}")]
    InvalidArguments {
        /// The tool name.
        name: String,
        /// Validation details.
        message: String,
    },

    /// The handler ran and returned an error.
    #[error("Tool '{name}' failed: {source}")]
    Execution {
        /// The tool name.
        name: String,
        /// The handler's error.
        source: ToolError,
    },

    /// The handler did not finish within the tool timeout.
    #[error("Tool '{name}' timed out after {limit:?}")]
    TimedOut {
        /// The tool name.
        name: String,
        /// The configured per-call limit.
        limit: Duration,
    },
}
