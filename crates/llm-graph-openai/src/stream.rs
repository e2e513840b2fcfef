//! SSE parser for streamed chat completions.
//!
//! Turns the raw `reqwest::Response` byte stream into a [`ChatStream`].
//! Handles UTF-8 sequences split across network chunks and assembles
//! tool calls whose arguments arrive in fragments.
//!
//! `finish_reason` arrives before the usage chunk, so
//! [`StreamEvent::Done`] is only emitted on the `[DONE]` sentinel.

use std::collections::BTreeMap;

use futures::stream::StreamExt;
use llm_graph::chat::{StopReason, ToolCall};
use llm_graph::error::LlmError;
use llm_graph::stream::{ChatStream, StreamEvent};

use crate::convert::{convert_stop_reason, convert_usage, parse_arguments};
use crate::types::StreamChunk;

/// Maximum size for buffers before we abort the stream.
const MAX_BUF: usize = 16 * 1024 * 1024; // 16 MiB

/// A tool call being assembled from deltas.
#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Parser state carried across network chunks.
#[derive(Debug, Default)]
struct SseState {
    buffer: String,
    utf8_buf: Vec<u8>,
    calls: BTreeMap<u32, PartialCall>,
    finish: Option<StopReason>,
    saw_tool_calls: bool,
    done: bool,
}

/// Converts an SSE response into a [`ChatStream`].
pub(crate) fn into_stream(response: reqwest::Response) -> ChatStream {
    let stream = response
        .bytes_stream()
        .scan(SseState::default(), |state, chunk| {
            let events = match chunk {
                Ok(bytes) => state.feed(&bytes),
                Err(e) => vec![Err(LlmError::Http {
                    status: None,
                    message: format!("stream read error: {e}"),
                    retryable: true,
                })],
            };
            async move { Some(events) }
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

impl SseState {
    /// Consumes one network chunk and returns every complete event in it.
    fn feed(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent, LlmError>> {
        self.utf8_buf.extend_from_slice(bytes);
        if self.utf8_buf.len() > MAX_BUF || self.buffer.len() > MAX_BUF {
            self.utf8_buf.clear();
            self.buffer.clear();
            return vec![Err(LlmError::ResponseFormat {
                message: "SSE stream buffer exceeded 16 MiB".into(),
                raw: String::new(),
            })];
        }

        match std::str::from_utf8(&self.utf8_buf) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.utf8_buf.clear();
            }
            Err(e) => {
                let valid_up_to = e.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&self.utf8_buf[..valid_up_to]) {
                    self.buffer.push_str(valid);
                }
                // An incomplete trailing sequence waits for the next
                // chunk; invalid bytes are dropped.
                let skip = valid_up_to + e.error_len().unwrap_or(0);
                self.utf8_buf.drain(..skip);
            }
        }

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find("\n\n") {
            let event_text: String = self.buffer.drain(..pos + 2).collect();
            events.extend(self.parse_event(&event_text).into_iter().map(Ok));
        }
        events
    }

    /// Parses one SSE event block.
    fn parse_event(&mut self, event_text: &str) -> Vec<StreamEvent> {
        let Some(data) = extract_data_line(event_text) else {
            return Vec::new();
        };

        if data == "[DONE]" {
            let mut events = self.flush_calls();
            if !self.done {
                self.done = true;
                let stop_reason = self.finish.unwrap_or(if self.saw_tool_calls {
                    StopReason::ToolUse
                } else {
                    StopReason::EndTurn
                });
                events.push(StreamEvent::Done { stop_reason });
            }
            return events;
        }

        let chunk = match serde_json::from_str::<StreamChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable SSE payload");
                return Vec::new();
            }
        };

        let mut events = Vec::new();
        if let Some(choice) = chunk.choices.into_iter().next() {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                events.push(StreamEvent::TextDelta(text));
            }

            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let index = tc.index;
                let (name, arguments) = tc
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or_default();

                if !self.calls.contains_key(&index) {
                    let call = PartialCall {
                        id: tc.id.unwrap_or_default(),
                        name: name.unwrap_or_default(),
                        arguments: String::new(),
                    };
                    events.push(StreamEvent::ToolCallStart {
                        index,
                        id: call.id.clone(),
                        name: call.name.clone(),
                    });
                    self.calls.insert(index, call);
                    self.saw_tool_calls = true;
                }

                if let Some(args) = arguments.filter(|a| !a.is_empty()) {
                    if let Some(call) = self.calls.get_mut(&index) {
                        call.arguments.push_str(&args);
                    }
                    events.push(StreamEvent::ToolCallDelta {
                        index,
                        json_chunk: args,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.finish = Some(convert_stop_reason(&reason));
                events.extend(self.flush_calls());
            }
        }

        if let Some(usage) = chunk.usage {
            events.push(StreamEvent::Usage(convert_usage(usage)));
        }
        events
    }

    /// Emits every assembled call as `ToolCallComplete`, in index order.
    fn flush_calls(&mut self) -> Vec<StreamEvent> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .map(|(index, call)| StreamEvent::ToolCallComplete {
                index,
                call: ToolCall {
                    id: call.id,
                    name: call.name,
                    arguments: parse_arguments(&call.arguments),
                },
            })
            .collect()
    }
}

/// Extracts the `data:` payload of an SSE event block.
fn extract_data_line(event_text: &str) -> Option<&str> {
    event_text.lines().find_map(|line| {
        let line = line.trim_end_matches('\r');
        line.strip_prefix("data:").map(str::trim_start)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(state: &mut SseState, payloads: &[&str]) -> Vec<StreamEvent> {
        payloads
            .iter()
            .flat_map(|p| state.parse_event(&format!("data: {p}\n\n")))
            .collect()
    }

    #[test]
    fn test_extract_data_line() {
        assert_eq!(
            extract_data_line("data: {\"choices\":[]}\n\n"),
            Some("{\"choices\":[]}")
        );
        assert_eq!(extract_data_line("data:[DONE]\n\n"), Some("[DONE]"));
        assert_eq!(extract_data_line("event: ping\n\n"), None);
        assert_eq!(
            extract_data_line("data: {\"choices\":[]}\r\n\r\n"),
            Some("{\"choices\":[]}")
        );
    }

    #[test]
    fn test_text_stream_done_after_usage() {
        let mut state = SseState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
                r#"{"choices":[],"usage":{"prompt_tokens":42,"completion_tokens":10}}"#,
                "[DONE]",
            ],
        );

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], StreamEvent::TextDelta("Hel".into()));
        assert_eq!(events[1], StreamEvent::TextDelta("lo".into()));
        assert!(matches!(
            &events[2],
            StreamEvent::Usage(u) if u.input_tokens == 42 && u.output_tokens == 10
        ));
        assert_eq!(
            events[3],
            StreamEvent::Done {
                stop_reason: StopReason::EndTurn
            }
        );
    }

    #[test]
    fn test_tool_call_lifecycle() {
        let mut state = SseState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_abc","type":"function","function":{"name":"get_weather","arguments":""}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Tokyo\"}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ],
        );

        assert!(matches!(
            &events[0],
            StreamEvent::ToolCallStart { index: 0, id, name }
                if id == "call_abc" && name == "get_weather"
        ));
        assert!(matches!(
            &events[1],
            StreamEvent::ToolCallDelta { index: 0, json_chunk } if json_chunk == r#"{"city":"#
        ));
        assert!(matches!(
            &events[3],
            StreamEvent::ToolCallComplete { index: 0, call }
                if call.name == "get_weather" && call.arguments["city"] == "Tokyo"
        ));
        assert_eq!(
            events[4],
            StreamEvent::Done {
                stop_reason: StopReason::ToolUse
            }
        );
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_parallel_calls_complete_in_index_order() {
        let mut state = SseState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"b","function":{"name":"fetch","arguments":"{}"}}]},"finish_reason":null}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"a","function":{"name":"search","arguments":"{}"}}]},"finish_reason":null}]}"#,
                "[DONE]",
            ],
        );
        let completed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallComplete { call, .. } => Some(call.id.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(completed, ["a", "b"]);
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Done {
                stop_reason: StopReason::ToolUse
            })
        );
    }

    #[test]
    fn test_call_without_id_is_still_assembled() {
        let mut state = SseState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"name":"search","arguments":"{\"q\":1}"}}]},"finish_reason":"tool_calls"}]}"#,
            ],
        );
        assert!(matches!(
            &events[2],
            StreamEvent::ToolCallComplete { call, .. }
                if call.id.is_empty() && call.arguments["q"] == 1
        ));
    }

    #[test]
    fn test_no_args_call_flushed_on_done() {
        let mut state = SseState::default();
        let events = parse_all(
            &mut state,
            &[
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_xyz","function":{"name":"no_args_tool","arguments":""}}]},"finish_reason":null}]}"#,
                "[DONE]",
            ],
        );
        assert!(matches!(
            &events[1],
            StreamEvent::ToolCallComplete { call, .. }
                if call.name == "no_args_tool" && call.arguments == serde_json::json!({})
        ));
    }

    #[test]
    fn test_unparseable_and_empty_deltas_ignored() {
        let mut state = SseState::default();
        let events = parse_all(
            &mut state,
            &[
                "not-json",
                r#"{"choices":[{"delta":{"content":""},"finish_reason":null}]}"#,
            ],
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_feed_handles_split_utf8_and_events() {
        let mut state = SseState::default();
        let payload = "data: {\"choices\":[{\"delta\":{\"content\":\"héllo\"},\"finish_reason\":null}]}\n\n";
        let bytes = payload.as_bytes();
        let split = payload.find('é').unwrap() + 1;

        assert!(state.feed(&bytes[..split]).is_empty());
        let events = state.feed(&bytes[split..]);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta("héllo".into())
        );
    }
}
