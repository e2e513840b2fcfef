//! The model invoker: one chat-completion call per graph turn.
//!
//! [`ModelInvoker`] wraps a [`DynProvider`] with request defaults. Given
//! the log and the tool definitions it produces one [`ChatResponse`],
//! which the graph turns into exactly one assistant message. It never
//! touches the log itself.
//!
//! When an active [`EventSink`] is supplied the provider is asked to
//! stream, and every text delta is forwarded as
//! [`GraphEvent::ModelToken`] while the full response is assembled.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::chat::{ChatMessage, ChatResponse};
use crate::error::LlmError;
use crate::events::{EventSink, GraphEvent};
use crate::provider::{ChatParams, DynProvider, ProviderMetadata, ToolChoice, ToolDefinition};
use crate::stream::{StreamEvent, collect_stream};

/// A provider plus the request defaults applied on every call.
#[derive(Clone)]
pub struct ModelInvoker {
    provider: Arc<dyn DynProvider>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system: Option<String>,
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for ModelInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInvoker")
            .field("provider", &self.provider.metadata())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("has_system", &self.system.is_some())
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ModelInvoker {
    /// Wraps a provider with no request defaults.
    pub fn new(provider: Arc<dyn DynProvider>) -> Self {
        Self {
            provider,
            temperature: None,
            max_tokens: None,
            system: None,
            request_timeout: None,
        }
    }

    /// Sampling temperature sent with every request.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Token cap sent with every request.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// System prompt the provider prepends when the log has none.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Per-request transport timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Metadata of the wrapped provider.
    pub fn metadata(&self) -> ProviderMetadata {
        self.provider.metadata()
    }

    /// Builds the request for one turn.
    ///
    /// An empty tool list is sent as no tools at all.
    pub fn params(
        &self,
        log: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
    ) -> ChatParams {
        let tools = (!tools.is_empty()).then(|| tools.to_vec());
        ChatParams {
            messages: log.to_vec(),
            tool_choice: tools.as_ref().and(tool_choice),
            tools,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            system: self.system.clone(),
            timeout: self.request_timeout,
        }
    }

    /// Requests one response without streaming.
    pub async fn invoke(
        &self,
        log: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse, LlmError> {
        self.invoke_with(log, tools, None, &EventSink::none()).await
    }

    /// Requests one response, streaming tokens to `sink` when it is active.
    ///
    /// Tokens are only observations: the returned response is complete
    /// or the call fails, never partial.
    pub async fn invoke_with(
        &self,
        log: &[ChatMessage],
        tools: &[ToolDefinition],
        tool_choice: Option<ToolChoice>,
        sink: &EventSink,
    ) -> Result<ChatResponse, LlmError> {
        let params = self.params(log, tools, tool_choice);
        tracing::debug!(
            messages = params.messages.len(),
            tools = tools.len(),
            streaming = sink.is_active(),
            "invoking model"
        );

        if !sink.is_active() {
            return self.provider.generate_boxed(&params).await;
        }

        let model = self.provider.metadata().model;
        let stream = self.provider.stream_boxed(&params).await?;
        let observed = stream.then(|event| async move {
            if let Ok(StreamEvent::TextDelta(text)) = &event {
                sink.emit(GraphEvent::ModelToken(text.clone())).await;
            }
            event
        });
        collect_stream(observed, &model).await
    }
}

/// Gives every tool call a usable id.
///
/// Empty ids become `call_{turn}_{index}`. Two calls sharing an id in
/// the same turn cannot be told apart, so that is a response format
/// error.
pub(crate) fn assign_call_ids(mut response: ChatResponse, turn: u32) -> Result<ChatResponse, LlmError> {
    let mut seen = HashSet::new();
    for (index, call) in response.tool_calls.iter_mut().enumerate() {
        if call.id.trim().is_empty() {
            call.id = format!("call_{turn}_{index}");
        }
        if !seen.insert(call.id.clone()) {
            return Err(LlmError::ResponseFormat {
                message: format!("duplicate tool call id '{}' in one turn", call.id),
                raw: String::new(),
            });
        }
    }
    Ok(response)
}
