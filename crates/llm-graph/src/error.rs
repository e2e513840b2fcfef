//! Error types.
//!
//! Two layers:
//!
//! - [`LlmError`] is what a model backend returns. Every provider maps
//!   its native failures (transport, auth, malformed body) into it.
//! - [`GraphError`] is what a graph run returns when it cannot finish.
//!   It carries the [`GraphFailure`] cause, the router state the run was
//!   in, and the message log accumulated up to the failure so callers
//!   can inspect or resume the conversation.
//!
//! Tool failures never appear here: they are recovered inside the run
//! and reported to the model as error results (see
//! [`DispatchError`](crate::tool::DispatchError)).

use std::time::Duration;

use crate::chat::ChatMessage;
use crate::router::RouterState;

/// The unified error type returned by all provider operations.
///
/// Variants are `#[non_exhaustive]`; always include a wildcard arm.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum LlmError {
    /// An HTTP-level failure (transport error, unexpected status code).
    ///
    /// `status` is `None` when the request never received a response.
    #[error("HTTP error (status={status:?}): {message}")]
    Http {
        /// The HTTP status code, if one was received.
        status: Option<http::StatusCode>,
        /// A human-readable description of the failure.
        message: String,
        /// Whether the upstream marked the failure as transient.
        retryable: bool,
    },

    /// The API key or token was rejected.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The request was malformed (missing fields, invalid parameters).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A provider-specific error that doesn't map to another variant.
    #[error("Provider error ({code}): {message}")]
    Provider {
        /// Provider-defined error code (e.g. `"overloaded"`).
        code: String,
        /// Human-readable error description.
        message: String,
        /// Whether the upstream marked the failure as transient.
        retryable: bool,
    },

    /// The response body could not be parsed or broke the protocol.
    #[error("Response format error: {message}")]
    ResponseFormat {
        /// What went wrong during parsing.
        message: String,
        /// The raw response body, for diagnostics.
        raw: String,
    },

    /// Tool arguments failed JSON Schema validation.
    #[error("Schema validation error: {message}")]
    SchemaValidation {
        /// Concatenated validation error messages.
        message: String,
        /// The schema the value was validated against.
        schema: serde_json::Value,
        /// The value that failed validation.
        actual: serde_json::Value,
    },

    /// The request exceeded its deadline.
    #[error("Operation timed out after {elapsed_ms}ms")]
    Timeout {
        /// Milliseconds elapsed before the timeout fired.
        elapsed_ms: u64,
    },
}

impl LlmError {
    /// Returns `true` if the upstream reported the failure as transient.
    ///
    /// The graph never retries on its own; this is informational for
    /// callers deciding whether to re-run.
    ///
    /// ```rust
    /// use llm_graph::LlmError;
    ///
    /// assert!(LlmError::Timeout { elapsed_ms: 5000 }.is_retryable());
    /// assert!(!LlmError::Auth("bad key".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { retryable, .. } | Self::Provider { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::ResponseFormat {
            message: err.to_string(),
            raw: String::new(),
        }
    }
}

/// Why a graph run stopped before reaching `Done`.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GraphFailure {
    /// The model backend failed. Fatal: the graph does not retry.
    #[error("model invocation failed: {0}")]
    ModelInvocation(#[from] LlmError),

    /// The model kept requesting tools past the configured turn limit.
    #[error("iteration limit of {limit} model turns reached")]
    IterationLimit {
        /// The configured `max_iterations`.
        limit: u32,
    },

    /// The run exceeded its wall-clock budget.
    #[error("run timed out after {limit:?}")]
    Timeout {
        /// The configured timeout.
        limit: Duration,
    },

    /// The caller cancelled the run.
    #[error("run cancelled")]
    Cancelled,

    /// The seed log cannot start a run.
    #[error("invalid initial log: {0}")]
    InvalidLog(String),

    /// An append would break the log's call/result pairing.
    #[error("conversation protocol violation: {0}")]
    Protocol(String),
}

/// A failed run: the cause plus everything needed to inspect or resume.
///
/// `log` holds every message appended before the failure, including the
/// seed. It always ends at a complete boundary: a model message or a
/// fully answered tool batch, never a partially streamed message.
#[derive(Debug, thiserror::Error)]
#[error("graph run failed in state {state} after {iterations} model turns: {cause}")]
pub struct GraphError {
    /// Router state when the failure happened.
    pub state: RouterState,
    /// The underlying failure.
    #[source]
    pub cause: GraphFailure,
    /// The message log accumulated so far.
    pub log: Vec<ChatMessage>,
    /// Model turns completed before the failure.
    pub iterations: u32,
}

impl GraphError {
    /// Returns the model error, if the run failed in the model invoker.
    pub fn llm_error(&self) -> Option<&LlmError> {
        match &self.cause {
            GraphFailure::ModelInvocation(err) => Some(err),
            _ => None,
        }
    }
}
