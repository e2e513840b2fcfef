//! Conversion between `llm-graph` types and the Chat Completions wire format.

use llm_graph::chat::{ChatMessage, ChatResponse, ChatRole, StopReason, ToolCall};
use llm_graph::error::LlmError;
use llm_graph::provider::{ChatParams, ToolChoice};
use llm_graph::usage::Usage;
use serde_json::Value;

use crate::config::OpenAiConfig;
use crate::types::{
    ErrorResponse, FunctionCallRequest, FunctionDef, Message, Request, Response, ResponseUsage,
    StreamOptions, Tool, ToolCallRequest,
};

// ── Request conversion ───────────────────────────────────────────────

/// Builds the request body for one call.
///
/// `params.system` is sent as a leading system message unless the log
/// already starts with one.
pub(crate) fn build_request<'a>(
    params: &'a ChatParams,
    config: &'a OpenAiConfig,
    stream: bool,
) -> Request<'a> {
    let has_system = params
        .messages
        .first()
        .is_some_and(|m| m.role == ChatRole::System);
    let mut messages = Vec::with_capacity(params.messages.len() + 1);
    if let Some(system) = params.system.as_ref().filter(|_| !has_system) {
        messages.push(Message {
            role: "system",
            content: Some(system.clone()),
            tool_calls: None,
            tool_call_id: None,
        });
    }
    messages.extend(params.messages.iter().map(convert_message));

    let tools = params.tools.as_ref().map(|tools| {
        tools
            .iter()
            .map(|t| Tool {
                tool_type: "function",
                function: FunctionDef {
                    name: &t.name,
                    description: &t.description,
                    parameters: t.parameters.as_value(),
                },
            })
            .collect()
    });

    Request {
        model: &config.model,
        messages,
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        stream: stream.then_some(true),
        stream_options: stream.then_some(StreamOptions {
            include_usage: true,
        }),
        tools,
        tool_choice: params.tool_choice.as_ref().map(convert_tool_choice),
    }
}

fn convert_message(msg: &ChatMessage) -> Message {
    let text = msg.content.to_text();
    match msg.role {
        ChatRole::System => Message {
            role: "system",
            content: Some(text),
            tool_calls: None,
            tool_call_id: None,
        },
        ChatRole::User => Message {
            role: "user",
            content: Some(text),
            tool_calls: None,
            tool_call_id: None,
        },
        ChatRole::Assistant => {
            let tool_calls: Vec<_> = msg
                .tool_calls
                .iter()
                .map(|call| ToolCallRequest {
                    id: call.id.clone(),
                    call_type: "function",
                    function: FunctionCallRequest {
                        name: call.name.clone(),
                        arguments: call.arguments.to_string(),
                    },
                })
                .collect();
            Message {
                role: "assistant",
                content: (!text.is_empty() || tool_calls.is_empty()).then_some(text),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                tool_call_id: None,
            }
        }
        ChatRole::Tool => Message {
            role: "tool",
            content: Some(text),
            tool_calls: None,
            tool_call_id: msg.tool_call_id.clone(),
        },
    }
}

fn convert_tool_choice(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::None => Value::String("none".into()),
        ToolChoice::Required => Value::String("required".into()),
        ToolChoice::Specific(name) => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
        _ => Value::String("auto".into()),
    }
}

// ── Response conversion ──────────────────────────────────────────────

/// Converts a complete response, taking the first choice.
pub(crate) fn convert_response(resp: Response) -> Result<ChatResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::ResponseFormat {
            message: "response has no choices".into(),
            raw: String::new(),
        })?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            arguments: parse_arguments(&tc.function.arguments),
            name: tc.function.name,
        })
        .collect();

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        usage: resp.usage.map_or_else(Usage::default, convert_usage),
        stop_reason: choice
            .finish_reason
            .as_deref()
            .map_or(StopReason::EndTurn, convert_stop_reason),
        model: resp.model,
    })
}

/// Decodes a tool call's argument string.
///
/// An empty string means no arguments. Text that is not JSON is passed
/// on as a JSON string so schema validation reports it to the model
/// instead of failing the turn.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| {
        tracing::warn!(arguments = raw, "tool call arguments are not valid JSON");
        Value::String(raw.to_owned())
    })
}

pub(crate) fn convert_usage(usage: ResponseUsage) -> Usage {
    Usage {
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    }
}

/// Maps `finish_reason` to [`StopReason`].
pub(crate) fn convert_stop_reason(reason: &str) -> StopReason {
    match reason {
        "stop" => StopReason::EndTurn,
        "tool_calls" | "function_call" => StopReason::ToolUse,
        "length" => StopReason::MaxTokens,
        other => {
            tracing::warn!(finish_reason = other, "unexpected finish_reason");
            StopReason::EndTurn
        }
    }
}

// ── Error conversion ─────────────────────────────────────────────────

/// Converts an error status and body into an [`LlmError`].
pub(crate) fn convert_error(status: http::StatusCode, body: &str) -> LlmError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.to_string(), |e| e.error.message);

    if status == http::StatusCode::UNAUTHORIZED || status == http::StatusCode::FORBIDDEN {
        return LlmError::Auth(message);
    }

    if status == http::StatusCode::BAD_REQUEST {
        return LlmError::InvalidRequest(message);
    }

    let retryable = status == http::StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

    LlmError::Http {
        status: Some(status),
        message,
        retryable,
    }
}
