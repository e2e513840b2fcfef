//! Pre-built helpers for testing code built on `llm-graph`.
//!
//! Available with the `test-utils` feature so downstream crates can
//! reuse them, and compiled for this crate's own tests. Provides sample
//! responses, a tool-call shorthand, stream collectors, and a quick
//! [`MockProvider`] factory.

use futures::StreamExt;
use serde_json::Value;

use crate::chat::{ChatResponse, StopReason, ToolCall};
use crate::error::LlmError;
use crate::mock::MockProvider;
use crate::provider::ProviderMetadata;
use crate::stream::{ChatStream, StreamEvent};
use crate::usage::Usage;

/// Builds a text-only end-of-turn [`ChatResponse`].
pub fn sample_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: text.into(),
        tool_calls: Vec::new(),
        usage: sample_usage(),
        stop_reason: StopReason::EndTurn,
        model: "test-model".into(),
    }
}

/// Builds a [`ChatResponse`] requesting the given tool calls.
pub fn sample_tool_response(calls: Vec<ToolCall>) -> ChatResponse {
    ChatResponse {
        content: String::new(),
        tool_calls: calls,
        usage: sample_usage(),
        stop_reason: StopReason::ToolUse,
        model: "test-model".into(),
    }
}

/// Shorthand for a [`ToolCall`].
pub fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments,
    }
}

/// Returns a [`Usage`] with 100 input / 50 output tokens.
pub fn sample_usage() -> Usage {
    Usage {
        input_tokens: 100,
        output_tokens: 50,
    }
}

/// Collect stream events, returning results including errors.
pub async fn collect_stream_results(stream: ChatStream) -> Vec<Result<StreamEvent, LlmError>> {
    stream.collect::<Vec<_>>().await
}

/// Collect stream events, panicking on any error.
pub async fn collect_stream_events(stream: ChatStream) -> Vec<StreamEvent> {
    stream
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .map(|r| r.expect("stream event should be Ok"))
        .collect()
}

/// Creates a [`MockProvider`] with the given name and model.
pub fn mock_for(provider_name: &str, model: &str) -> MockProvider {
    MockProvider::new(ProviderMetadata {
        name: provider_name.to_owned().into(),
        model: model.into(),
    })
}
