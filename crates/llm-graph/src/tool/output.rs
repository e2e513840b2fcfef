//! Tool output types.

use serde_json::Value;

use crate::chat::MessageContent;

/// Output returned by a tool handler.
///
/// Text and structured payloads are both accepted; the model sees JSON
/// payloads serialized.
///
/// ```rust
/// use llm_graph::tool::ToolOutput;
///
/// let text = ToolOutput::new("Result: 42");
/// let structured = ToolOutput::from(serde_json::json!({"temp_c": 21}));
/// assert_eq!(text.content.as_text(), Some("Result: 42"));
/// assert!(structured.content.as_text().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// The content returned to the model.
    pub content: MessageContent,
}

impl ToolOutput {
    /// Creates a new tool output with the given content.
    pub fn new(content: impl Into<MessageContent>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ToolOutput {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
