//! Routing decisions.
//!
//! The router is a pure function of the current [`RouterState`] and the
//! latest log entries:
//!
//! ```text
//!   AwaitingModel ──(assistant msg with tool calls)──▶ AwaitingTools
//!   AwaitingModel ──(assistant msg, no tool calls)───▶ Done
//!   AwaitingTools ──(every call answered)────────────▶ AwaitingModel
//! ```
//!
//! The stop reason a provider reports is ignored: only the presence of
//! tool calls decides. Unknown tool names do not affect routing; they are
//! answered with error results and the batch transitions as a whole.
//!
//! [`ToolSelector`] decides which tool stage of a graph handles a call.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chat::ChatRole;
use crate::conversation::MessageLog;

/// Where a run is in the model/tool cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterState {
    /// The next step is a model call.
    AwaitingModel,
    /// The latest model message requested tools that have not all run.
    AwaitingTools,
    /// The model answered without requesting tools. Terminal.
    Done,
}

impl RouterState {
    /// Returns `true` for [`RouterState::Done`].
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl fmt::Display for RouterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AwaitingModel => "awaiting_model",
            Self::AwaitingTools => "awaiting_tools",
            Self::Done => "done",
        })
    }
}

/// A state change recorded by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// State before routing.
    pub from: RouterState,
    /// State after routing.
    pub to: RouterState,
}

impl Transition {
    /// Returns `true` if routing changed the state.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Computes the next state from the current one and the log.
///
/// While `AwaitingModel`, nothing happens until an assistant message is
/// the latest entry. While `AwaitingTools`, the state holds until the
/// latest assistant message has a result for every call.
pub fn route(current: RouterState, log: &MessageLog) -> RouterState {
    match current {
        RouterState::AwaitingModel => match log.last() {
            Some(message) if message.role == ChatRole::Assistant => {
                if message.tool_calls.is_empty() {
                    RouterState::Done
                } else {
                    RouterState::AwaitingTools
                }
            }
            _ => RouterState::AwaitingModel,
        },
        RouterState::AwaitingTools => {
            if log.pending_tool_calls().is_empty() {
                RouterState::AwaitingModel
            } else {
                RouterState::AwaitingTools
            }
        }
        RouterState::Done => RouterState::Done,
    }
}

/// Which tool calls a stage accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ToolSelector {
    /// Every call.
    #[default]
    All,
    /// Only calls to the named tools.
    Only(BTreeSet<String>),
}

impl ToolSelector {
    /// Accepts only the given tool names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// Returns `true` if a call to `name` belongs to this selector.
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatMessage, ToolCall};
    use crate::conversation::ConversationState;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "get_weather".into(),
            arguments: json!({}),
        }
    }

    fn state_with(messages: Vec<ChatMessage>) -> ConversationState {
        let mut iter = messages.into_iter();
        let mut state = ConversationState::new(vec![iter.next().unwrap()]).unwrap();
        for m in iter {
            state.append(m).unwrap();
        }
        state
    }

    #[test]
    fn test_no_tool_calls_routes_to_done() {
        let state = state_with(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")]);
        assert_eq!(
            route(RouterState::AwaitingModel, state.log()),
            RouterState::Done
        );
    }

    #[test]
    fn test_tool_calls_route_to_tools() {
        let state = state_with(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_calls("", vec![call("c1")]),
        ]);
        assert_eq!(
            route(RouterState::AwaitingModel, state.log()),
            RouterState::AwaitingTools
        );
    }

    #[test]
    fn test_awaiting_model_holds_without_assistant_message() {
        let state = state_with(vec![ChatMessage::user("hi")]);
        assert_eq!(
            route(RouterState::AwaitingModel, state.log()),
            RouterState::AwaitingModel
        );
    }

    #[test]
    fn test_tools_wait_for_complete_batch() {
        let mut state = state_with(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_calls("", vec![call("c1"), call("c2")]),
            ChatMessage::tool_result("c1", "a"),
        ]);
        assert_eq!(
            route(RouterState::AwaitingTools, state.log()),
            RouterState::AwaitingTools
        );
        state.append(ChatMessage::tool_result("c2", "b")).unwrap();
        assert_eq!(
            route(RouterState::AwaitingTools, state.log()),
            RouterState::AwaitingModel
        );
    }

    #[test]
    fn test_done_is_terminal() {
        let state = state_with(vec![ChatMessage::user("hi")]);
        assert_eq!(route(RouterState::Done, state.log()), RouterState::Done);
        assert!(RouterState::Done.is_terminal());
    }

    #[test]
    fn test_advance_records_transition() {
        let mut state = state_with(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_calls("", vec![call("c1")]),
        ]);
        let t = state.advance();
        assert_eq!(t.from, RouterState::AwaitingModel);
        assert_eq!(t.to, RouterState::AwaitingTools);
        assert!(t.changed());
    }

    #[test]
    fn test_selector_accepts() {
        let only = ToolSelector::only(["search_tool"]);
        assert!(only.accepts("search_tool"));
        assert!(!only.accepts("crawl"));
        assert!(ToolSelector::All.accepts("anything"));
    }
}
