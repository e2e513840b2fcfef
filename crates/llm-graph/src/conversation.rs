//! The append-only message log and the per-run conversation state.
//!
//! [`MessageLog`] is an ordered list of [`ChatMessage`]s that can only
//! grow. [`ConversationState`] owns one log for the duration of a run and
//! guards every append:
//!
//! - a tool message must answer an unanswered call of the latest
//!   assistant message;
//! - no other message may be appended while calls are unanswered;
//! - tool call ids within one assistant message must be unique.
//!
//! Violations are reported as [`GraphFailure::Protocol`] and leave the
//! log untouched.

use std::collections::HashSet;

use crate::chat::{ChatMessage, ChatRole, ToolCall, ToolResult};
use crate::error::GraphFailure;
use crate::router::{RouterState, Transition, route};

/// An ordered, append-only sequence of messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if the log has no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// All messages, oldest first.
    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    /// Consumes the log, returning the messages.
    pub fn into_vec(self) -> Vec<ChatMessage> {
        self.messages
    }

    /// The calls of the latest assistant message that have no tool
    /// message answering them yet, in call order.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        let Some(pos) = self
            .messages
            .iter()
            .rposition(|m| m.role == ChatRole::Assistant)
        else {
            return Vec::new();
        };
        let answered: HashSet<&str> = self.messages[pos + 1..]
            .iter()
            .filter(|m| m.role == ChatRole::Tool)
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        self.messages[pos]
            .tool_calls
            .iter()
            .filter(|call| !answered.contains(call.id.as_str()))
            .collect()
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}

impl<'a> IntoIterator for &'a MessageLog {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

/// The log of one run plus its router state.
///
/// Exclusively owned by a single run; never shared between runs.
#[derive(Debug, Clone)]
pub struct ConversationState {
    log: MessageLog,
    state: RouterState,
}

impl ConversationState {
    /// Validates a seed log and starts in [`RouterState::AwaitingModel`].
    ///
    /// The seed must be non-empty, contain at least one system or user
    /// message, obey the append rules, and leave no call unanswered.
    pub fn new(seed: Vec<ChatMessage>) -> Result<Self, GraphFailure> {
        Self::from_seed(seed).map_err(|(failure, _)| failure)
    }

    /// Like [`new`](Self::new), but hands the seed back on failure.
    pub(crate) fn from_seed(
        seed: Vec<ChatMessage>,
    ) -> Result<Self, (GraphFailure, Vec<ChatMessage>)> {
        if seed.is_empty() {
            return Err((GraphFailure::InvalidLog("log is empty".into()), seed));
        }
        if !seed
            .iter()
            .any(|m| matches!(m.role, ChatRole::System | ChatRole::User))
        {
            return Err((
                GraphFailure::InvalidLog("log needs at least one system or user message".into()),
                seed,
            ));
        }

        let mut conversation = Self {
            log: MessageLog::new(),
            state: RouterState::AwaitingModel,
        };
        let mut rest = seed.into_iter();
        while let Some(message) = rest.next() {
            if let Err(e) = conversation.check(&message) {
                let mut messages = conversation.log.into_vec();
                messages.push(message);
                messages.extend(rest);
                return Err((GraphFailure::InvalidLog(e.to_string()), messages));
            }
            conversation.log.push(message);
        }
        let unanswered = conversation
            .log
            .pending_tool_calls()
            .first()
            .map(|call| call.id.clone());
        if let Some(id) = unanswered {
            return Err((
                GraphFailure::InvalidLog(format!("tool call '{id}' has no result")),
                conversation.log.into_vec(),
            ));
        }
        Ok(conversation)
    }

    /// The current router state.
    pub fn state(&self) -> RouterState {
        self.state
    }

    /// The log so far.
    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// Consumes the state, returning the messages.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        self.log.into_vec()
    }

    /// Calls still waiting for a result.
    pub fn pending_tool_calls(&self) -> Vec<&ToolCall> {
        self.log.pending_tool_calls()
    }

    /// Appends a message after checking the pairing rules.
    pub fn append(&mut self, message: ChatMessage) -> Result<(), GraphFailure> {
        self.check(&message)?;
        self.log.push(message);
        Ok(())
    }

    fn check(&self, message: &ChatMessage) -> Result<(), GraphFailure> {
        let pending: Vec<&str> = self
            .log
            .pending_tool_calls()
            .into_iter()
            .map(|c| c.id.as_str())
            .collect();

        if message.role == ChatRole::Tool {
            let Some(id) = message.tool_call_id.as_deref() else {
                return Err(GraphFailure::Protocol(
                    "tool message without tool_call_id".into(),
                ));
            };
            if !pending.contains(&id) {
                return Err(GraphFailure::Protocol(format!(
                    "tool result '{id}' does not answer a pending call"
                )));
            }
        } else if let Some(id) = pending.first() {
            return Err(GraphFailure::Protocol(format!(
                "{} message appended while tool call '{id}' is unanswered",
                message.role
            )));
        }

        if message.role == ChatRole::Assistant {
            let mut seen = HashSet::new();
            if let Some(dup) = message
                .tool_calls
                .iter()
                .find(|c| !seen.insert(c.id.as_str()))
            {
                return Err(GraphFailure::Protocol(format!(
                    "duplicate tool call id '{}'",
                    dup.id
                )));
            }
        }
        Ok(())
    }

    /// Appends a batch of results, all or nothing.
    ///
    /// The batch must answer every pending call exactly once.
    pub fn append_tool_results(&mut self, results: Vec<ToolResult>) -> Result<(), GraphFailure> {
        let mut pending: HashSet<String> = self
            .log
            .pending_tool_calls()
            .into_iter()
            .map(|c| c.id.clone())
            .collect();
        for result in &results {
            if !pending.remove(&result.tool_call_id) {
                return Err(GraphFailure::Protocol(format!(
                    "tool result '{}' does not answer a pending call",
                    result.tool_call_id
                )));
            }
        }
        if let Some(id) = pending.iter().next() {
            return Err(GraphFailure::Protocol(format!(
                "tool call '{id}' has no result in the batch"
            )));
        }
        for result in results {
            self.log.push(result.into());
        }
        Ok(())
    }

    /// Runs the router over the log and records the new state.
    pub fn advance(&mut self) -> Transition {
        let from = self.state;
        self.state = route(from, &self.log);
        Transition {
            from,
            to: self.state,
        }
    }
}
