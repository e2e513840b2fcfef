//! Graph run configuration and outcome types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, ChatRole};
use crate::usage::Usage;

/// What happens when the model still wants tools after
/// [`GraphConfig::max_iterations`] turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LimitBehavior {
    /// Fail with [`GraphFailure::IterationLimit`](crate::GraphFailure::IterationLimit),
    /// returning the log so far.
    #[default]
    Fail,
    /// Ask the model once more with tools withheld and finish with
    /// whatever it says.
    FinalAnswer,
}

/// Configuration for graph runs.
///
/// ```rust
/// use llm_graph::graph::{GraphConfig, LimitBehavior};
/// use std::time::Duration;
///
/// let config = GraphConfig {
///     max_iterations: 4,
///     on_limit: LimitBehavior::FinalAnswer,
///     timeout: Some(Duration::from_secs(120)),
///     ..Default::default()
/// };
/// assert!(config.parallel_tool_execution);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GraphConfig {
    /// Maximum model turns per run. Default: 10.
    pub max_iterations: u32,
    /// Run suspending sibling tool calls concurrently. Default: true.
    pub parallel_tool_execution: bool,
    /// Upper bound on concurrently running tool calls. Default: 8.
    pub max_concurrency: usize,
    /// Behavior once `max_iterations` is exhausted. Default: fail.
    pub on_limit: LimitBehavior,
    /// Wall-clock budget for the whole run. Default: none.
    pub timeout: Option<Duration>,
    /// Per-call budget for suspending tools. Default: none.
    pub tool_timeout: Option<Duration>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            parallel_tool_execution: true,
            max_concurrency: 8,
            on_limit: LimitBehavior::Fail,
            timeout: None,
            tool_timeout: None,
        }
    }
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// The model answered without requesting tools.
    Complete,
    /// The turn limit was hit and a tool-less final answer was taken.
    IterationLimit {
        /// The configured limit.
        limit: u32,
    },
}

/// The result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphRun {
    /// The seed plus every message the run appended.
    pub log: Vec<ChatMessage>,
    /// Model turns taken.
    pub iterations: u32,
    /// Tool calls dispatched across all turns.
    pub tool_calls_executed: usize,
    /// Token usage summed over every model turn.
    pub total_usage: Usage,
    /// How the run ended.
    pub termination: TerminationReason,
}

impl GraphRun {
    /// The final assistant message.
    pub fn final_message(&self) -> Option<&ChatMessage> {
        self.log.iter().rev().find(|m| m.role == ChatRole::Assistant)
    }

    /// Text of the final assistant message.
    pub fn final_text(&self) -> Option<&str> {
        self.final_message().and_then(ChatMessage::text)
    }
}
