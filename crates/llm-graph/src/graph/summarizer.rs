//! The optional summarizer node.
//!
//! In a search → fetch → summarize pipeline the last model turn is not
//! served by the tool-calling model but by a separate one that sees a
//! narrow projection of the log:
//!
//! 1. its own system prompt,
//! 2. the first user message (the original question),
//! 3. the latest tool result with non-empty content.
//!
//! It is offered no tools, so its answer always ends the run.

use std::sync::Arc;

use crate::chat::{ChatMessage, ChatResponse, ChatRole};
use crate::error::LlmError;
use crate::events::EventSink;
use crate::invoker::ModelInvoker;
use crate::provider::DynProvider;

const DEFAULT_FALLBACK: &str = "The tools returned no results to summarize.";

/// A dedicated model that writes the final answer after tools ran.
#[derive(Debug, Clone)]
pub struct Summarizer {
    invoker: ModelInvoker,
    system_prompt: String,
    fallback: String,
}

impl Summarizer {
    /// Creates a summarizer backed by `provider` with the given system prompt.
    pub fn new(provider: Arc<dyn DynProvider>, system_prompt: impl Into<String>) -> Self {
        Self {
            invoker: ModelInvoker::new(provider),
            system_prompt: system_prompt.into(),
            fallback: DEFAULT_FALLBACK.to_owned(),
        }
    }

    /// Sampling temperature for the summary model.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.invoker = self.invoker.with_temperature(temperature);
        self
    }

    /// Answer used, without calling the model, when no tool produced
    /// any content.
    #[must_use]
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    /// Builds the messages the summary model sees, or `None` when there
    /// is no non-empty tool result to summarize.
    pub fn project(&self, log: &[ChatMessage]) -> Option<Vec<ChatMessage>> {
        let evidence = log
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::Tool && !m.is_error && !m.content.is_empty())?;

        let mut messages = vec![ChatMessage::system(self.system_prompt.as_str())];
        if let Some(question) = log.iter().find(|m| m.role == ChatRole::User) {
            messages.push(question.clone());
        }
        messages.push(ChatMessage::user(format!(
            "Tool output:\n{}",
            evidence.content.to_text()
        )));
        Some(messages)
    }

    /// Produces the closing answer for `log`.
    pub(crate) async fn summarize(
        &self,
        log: &[ChatMessage],
        sink: &EventSink,
    ) -> Result<ChatResponse, LlmError> {
        let Some(messages) = self.project(log) else {
            tracing::debug!("no tool output to summarize, using fallback");
            return Ok(ChatResponse {
                content: self.fallback.clone(),
                ..ChatResponse::empty()
            });
        };
        self.invoker.invoke_with(&messages, &[], None, sink).await
    }
}
