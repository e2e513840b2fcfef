//! Streaming response types.
//!
//! When a provider streams its response it yields [`StreamEvent`]s
//! through a [`ChatStream`]: text deltas, tool-call fragments, usage,
//! and finally [`Done`](StreamEvent::Done).
//!
//! Tool calls arrive in three phases:
//! 1. [`ToolCallStart`](StreamEvent::ToolCallStart) announces `id` and `name`.
//! 2. [`ToolCallDelta`](StreamEvent::ToolCallDelta) carries JSON argument fragments.
//! 3. [`ToolCallComplete`](StreamEvent::ToolCallComplete) delivers the
//!    assembled [`ToolCall`].
//!
//! [`StreamCollector`] folds events back into a [`ChatResponse`];
//! [`collect_stream`] drives it over a whole stream. A stream that ends
//! before [`Done`](StreamEvent::Done) is an error, never a response.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::chat::{ChatResponse, StopReason, ToolCall};
use crate::error::LlmError;
use crate::usage::Usage;

/// A pinned, boxed, `Send` stream of [`StreamEvent`] results.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// An incremental event emitted during a streaming response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum StreamEvent {
    /// A fragment of the model's text output.
    TextDelta(String),
    /// Announces that a new tool call has started.
    ToolCallStart {
        /// Position of this call among the turn's calls.
        index: u32,
        /// Provider-assigned identifier.
        id: String,
        /// The name of the tool being called.
        name: String,
    },
    /// A JSON fragment of a tool call's arguments.
    ToolCallDelta {
        /// The tool-call index this delta belongs to.
        index: u32,
        /// A chunk of the JSON arguments string.
        json_chunk: String,
    },
    /// The fully assembled tool call.
    ToolCallComplete {
        /// The tool-call index this completion corresponds to.
        index: u32,
        /// The complete, parsed tool call.
        call: ToolCall,
    },
    /// Token usage reported so far.
    Usage(Usage),
    /// The stream has ended.
    Done {
        /// Why the model stopped generating.
        stop_reason: StopReason,
    },
}

/// Folds [`StreamEvent`]s into a complete [`ChatResponse`].
///
/// Completed tool calls are ordered by their stream index, not by
/// arrival. Start and delta fragments are ignored: providers emit a
/// [`ToolCallComplete`](StreamEvent::ToolCallComplete) once the
/// arguments parse.
#[derive(Debug)]
pub struct StreamCollector {
    content: String,
    calls: Vec<(u32, ToolCall)>,
    usage: Usage,
    stop_reason: StopReason,
    done: bool,
}

impl Default for StreamCollector {
    fn default() -> Self {
        Self {
            content: String::new(),
            calls: Vec::new(),
            usage: Usage::default(),
            stop_reason: StopReason::EndTurn,
            done: false,
        }
    }
}

impl StreamCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event. Returns the text delta, if the event carried one.
    pub fn push(&mut self, event: StreamEvent) -> Option<String> {
        match event {
            StreamEvent::TextDelta(text) => {
                self.content.push_str(&text);
                return Some(text);
            }
            StreamEvent::ToolCallComplete { index, call } => self.calls.push((index, call)),
            StreamEvent::Usage(u) => self.usage += &u,
            StreamEvent::Done { stop_reason } => {
                self.stop_reason = stop_reason;
                self.done = true;
            }
            StreamEvent::ToolCallStart { .. } | StreamEvent::ToolCallDelta { .. } => {}
        }
        None
    }

    /// Returns `true` once [`Done`](StreamEvent::Done) has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Assembles the response.
    ///
    /// Fails with [`LlmError::ResponseFormat`] if [`Done`](StreamEvent::Done)
    /// was never seen; the partial text is carried in `raw`.
    pub fn finish(mut self, model: &str) -> Result<ChatResponse, LlmError> {
        if !self.done {
            return Err(LlmError::ResponseFormat {
                message: "stream ended before completion".into(),
                raw: self.content,
            });
        }
        self.calls.sort_by_key(|(index, _)| *index);
        Ok(ChatResponse {
            content: self.content,
            tool_calls: self.calls.into_iter().map(|(_, call)| call).collect(),
            usage: self.usage,
            stop_reason: self.stop_reason,
            model: model.to_owned(),
        })
    }
}

/// Drains `stream` into a complete [`ChatResponse`].
///
/// Collection stops at [`Done`](StreamEvent::Done). The first error, or
/// the stream closing before `Done`, aborts collection; nothing partial
/// is returned.
pub async fn collect_stream<S>(stream: S, model: &str) -> Result<ChatResponse, LlmError>
where
    S: Stream<Item = Result<StreamEvent, LlmError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut collector = StreamCollector::new();
    while let Some(event) = stream.next().await {
        collector.push(event?);
        if collector.is_done() {
            break;
        }
    }
    collector.finish(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn boxed(events: Vec<Result<StreamEvent, LlmError>>) -> ChatStream {
        Box::pin(futures::stream::iter(events))
    }

    #[tokio::test]
    async fn test_collect_stream_text_and_calls() {
        let stream = boxed(vec![
            Ok(StreamEvent::TextDelta("Let me ".into())),
            Ok(StreamEvent::TextDelta("check.".into())),
            Ok(StreamEvent::ToolCallComplete {
                index: 1,
                call: ToolCall {
                    id: "b".into(),
                    name: "second".into(),
                    arguments: json!({}),
                },
            }),
            Ok(StreamEvent::ToolCallComplete {
                index: 0,
                call: ToolCall {
                    id: "a".into(),
                    name: "first".into(),
                    arguments: json!({}),
                },
            }),
            Ok(StreamEvent::Usage(Usage {
                input_tokens: 7,
                output_tokens: 3,
            })),
            Ok(StreamEvent::Done {
                stop_reason: StopReason::ToolUse,
            }),
        ]);

        let resp = collect_stream(stream, "m").await.unwrap();

        assert_eq!(resp.content, "Let me check.");
        assert_eq!(resp.tool_calls[0].id, "a");
        assert_eq!(resp.tool_calls[1].id, "b");
        assert_eq!(resp.usage.input_tokens, 7);
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
        assert_eq!(resp.model, "m");
    }

    #[tokio::test]
    async fn test_collect_stream_error_aborts() {
        let stream = boxed(vec![
            Ok(StreamEvent::TextDelta("partial".into())),
            Err(LlmError::Timeout { elapsed_ms: 10 }),
        ]);
        let result = collect_stream(stream, "m").await;
        assert!(matches!(result, Err(LlmError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_collect_stream_without_done_is_an_error() {
        let stream = boxed(vec![Ok(StreamEvent::TextDelta("The weather in Par".into()))]);
        let err = collect_stream(stream, "m").await.unwrap_err();
        match err {
            LlmError::ResponseFormat { message, raw } => {
                assert!(message.contains("before completion"));
                assert_eq!(raw, "The weather in Par");
            }
            other => panic!("expected ResponseFormat, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_collect_stream_stops_at_done() {
        let stream = boxed(vec![
            Ok(StreamEvent::TextDelta("done".into())),
            Ok(StreamEvent::Done {
                stop_reason: StopReason::EndTurn,
            }),
            Err(LlmError::Timeout { elapsed_ms: 10 }),
        ]);
        let resp = collect_stream(stream, "m").await.unwrap();
        assert_eq!(resp.content, "done");
    }

    #[test]
    fn test_finish_requires_done() {
        let mut collector = StreamCollector::new();
        collector.push(StreamEvent::TextDelta("half".into()));
        assert!(!collector.is_done());
        assert!(collector.finish("m").is_err());
    }
}
