//! Conversation primitives: messages, tool calls, tool results, and
//! model responses.
//!
//! A conversation is an ordered list of [`ChatMessage`]s. Each message
//! has a [`ChatRole`] and a [`MessageContent`] payload that is either
//! plain text or a structured JSON value. Assistant messages may carry
//! [`ToolCall`]s; tool messages answer exactly one of them through
//! `tool_call_id`.
//!
//! ```rust
//! use llm_graph::{ChatMessage, ToolCall};
//! use serde_json::json;
//!
//! let call = ToolCall {
//!     id: "call_1".into(),
//!     name: "get_weather".into(),
//!     arguments: json!({"city": "Paris"}),
//! };
//! let turn = ChatMessage::assistant_with_calls("", vec![call]);
//! assert!(turn.has_tool_calls());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usage::Usage;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the conversation.
    System,
    /// A human turn.
    User,
    /// A model turn, possibly requesting tool calls.
    Assistant,
    /// The result of one tool invocation.
    Tool,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// The payload of a message or tool result.
///
/// Serialized untagged: text is a JSON string and structured payloads
/// are the value itself. On deserialization any JSON string becomes
/// [`Text`](Self::Text), so `Json(Value::String(..))` reads back as
/// `Text` with the same string. `From<Value>` already maps strings to
/// `Text`, so only a hand-built `Json(Value::String(..))` changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// A structured payload, rendered as JSON when sent to a model.
    Json(Value),
}

impl MessageContent {
    /// Returns the text if this is a [`Text`](Self::Text) payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    /// Renders the payload as a string. JSON payloads are serialized
    /// compactly.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }

    /// Returns `true` for empty text, `null`, or empty JSON strings.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Json(Value::Null) => true,
            Self::Json(Value::String(s)) => s.trim().is_empty(),
            Self::Json(_) => false,
        }
    }
}

impl Default for MessageContent {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Value> for MessageContent {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Self::Text(text),
            other => Self::Json(other),
        }
    }
}

/// A request from the model to invoke a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier unique within one assistant turn.
    pub id: String,
    /// Registered tool name.
    pub name: String,
    /// JSON arguments, validated against the tool's schema on dispatch.
    pub arguments: Value,
}

/// The outcome of one tool invocation, linked to its call by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The [`ToolCall::id`] this result answers.
    pub tool_call_id: String,
    /// Content returned to the model. For failures this holds the
    /// error text so the model can see what went wrong.
    pub content: MessageContent,
    /// Whether the tool completed normally.
    pub success: bool,
    /// Error description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result.
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            success: true,
            error: None,
        }
    }

    /// A failed result. The error text doubles as the content.
    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            tool_call_id: tool_call_id.into(),
            content: MessageContent::Text(error.clone()),
            success: false,
            error: Some(error),
        }
    }
}

/// One entry of the message log.
///
/// Messages are immutable once appended; build them with the
/// constructors below rather than mutating fields afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: ChatRole,
    /// Message payload.
    pub content: MessageContent,
    /// For [`ChatRole::Tool`] messages, the call being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// For [`ChatRole::Assistant`] messages, the tools requested.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Marks a tool message produced from a failed invocation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatMessage {
    fn new(role: ChatRole, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
            is_error: false,
        }
    }

    /// A system message.
    pub fn system(content: impl Into<MessageContent>) -> Self {
        Self::new(ChatRole::System, content)
    }

    /// A human message.
    pub fn user(content: impl Into<MessageContent>) -> Self {
        Self::new(ChatRole::User, content)
    }

    /// An assistant message with no tool calls.
    pub fn assistant(content: impl Into<MessageContent>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }

    /// An assistant message requesting the given tool calls.
    pub fn assistant_with_calls(content: impl Into<MessageContent>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::new(ChatRole::Assistant, content)
        }
    }

    /// A successful tool message answering `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<MessageContent>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(ChatRole::Tool, content)
        }
    }

    /// Returns the text payload, if the content is text.
    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Returns `true` if this is an assistant message with at least
    /// one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.role == ChatRole::Assistant && !self.tool_calls.is_empty()
    }
}

impl From<ToolResult> for ChatMessage {
    fn from(result: ToolResult) -> Self {
        Self {
            role: ChatRole::Tool,
            content: result.content,
            tool_call_id: Some(result.tool_call_id),
            tool_calls: Vec::new(),
            is_error: !result.success,
        }
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StopReason {
    /// The model finished its turn.
    EndTurn,
    /// The model is waiting for tool results.
    ToolUse,
    /// The token limit was hit.
    MaxTokens,
    /// A stop sequence matched.
    StopSequence,
}

/// A complete model response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Generated text. Empty when the model only requested tools.
    pub content: String,
    /// Tool calls, in the order the model produced them.
    pub tool_calls: Vec<ToolCall>,
    /// Token accounting for this request.
    pub usage: Usage,
    /// Why generation stopped.
    pub stop_reason: StopReason,
    /// The model that produced the response.
    pub model: String,
}

impl ChatResponse {
    /// An empty end-of-turn response.
    pub fn empty() -> Self {
        Self {
            content: String::new(),
            tool_calls: Vec::new(),
            usage: Usage::default(),
            stop_reason: StopReason::EndTurn,
            model: String::new(),
        }
    }

    /// Returns the text, or `None` when there is none.
    pub fn text(&self) -> Option<&str> {
        (!self.content.is_empty()).then_some(self.content.as_str())
    }

    /// Converts the response into the assistant message appended to
    /// the log.
    pub fn into_message(self) -> ChatMessage {
        ChatMessage::assistant_with_calls(self.content, self.tool_calls)
    }
}
