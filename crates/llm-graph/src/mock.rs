//! Mock provider for testing.
//!
//! [`MockProvider`] is a queue-based fake that lets tests control
//! exactly what a model returns, without touching the network. It
//! implements [`Provider`], so it works anywhere a real backend does,
//! including behind `Arc<dyn DynProvider>` in an
//! [`ExecutionGraph`](crate::ExecutionGraph).
//!
//! ```rust,no_run
//! use llm_graph::mock::MockProvider;
//! use llm_graph::test_helpers::sample_response;
//! use llm_graph::{ChatParams, Provider, ProviderMetadata};
//!
//! # async fn example() {
//! let mock = MockProvider::new(ProviderMetadata {
//!     name: "test".into(),
//!     model: "test-model".into(),
//! });
//! mock.queue_response(sample_response("Hello!"));
//!
//! let resp = mock.generate(&ChatParams::default()).await.unwrap();
//! assert_eq!(resp.text(), Some("Hello!"));
//! assert_eq!(mock.recorded_calls().len(), 1);
//! # }
//! ```
//!
//! [`LlmError`] is not `Clone`, so queued failures use the cloneable
//! mirror [`MockError`] and are converted when dequeued.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::chat::ChatResponse;
use crate::error::LlmError;
use crate::provider::{ChatParams, Provider, ProviderMetadata};
use crate::stream::{ChatStream, StreamEvent};

/// A queue-based mock provider for unit and integration tests.
///
/// Each call to `generate` or `stream` pops from the front of the
/// respective queue and records its [`ChatParams`].
///
/// # Panics
///
/// [`generate`](Provider::generate) panics if the response queue is empty.
/// [`stream`](Provider::stream) panics if the stream queue is empty.
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<ChatResponse, MockError>>>,
    stream_responses: Mutex<VecDeque<Result<Vec<StreamEvent>, MockError>>>,
    meta: ProviderMetadata,
    calls: Arc<Mutex<Vec<ChatParams>>>,
    latency: Mutex<Option<Duration>>,
}

/// Cloneable error subset for mock queuing.
#[derive(Debug, Clone)]
pub enum MockError {
    /// Maps to [`LlmError::Http`].
    Http {
        /// HTTP status code, if any.
        status: Option<http::StatusCode>,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Auth`].
    Auth(String),
    /// Maps to [`LlmError::InvalidRequest`].
    InvalidRequest(String),
    /// Maps to [`LlmError::Provider`].
    Provider {
        /// Provider error code.
        code: String,
        /// Error message.
        message: String,
        /// Whether the error is retryable.
        retryable: bool,
    },
    /// Maps to [`LlmError::Timeout`].
    Timeout {
        /// Elapsed milliseconds.
        elapsed_ms: u64,
    },
    /// Maps to [`LlmError::ResponseFormat`].
    ResponseFormat {
        /// What went wrong during parsing.
        message: String,
        /// The raw response body.
        raw: String,
    },
}

impl MockError {
    fn into_llm_error(self) -> LlmError {
        match self {
            Self::Http {
                status,
                message,
                retryable,
            } => LlmError::Http {
                status,
                message,
                retryable,
            },
            Self::Auth(msg) => LlmError::Auth(msg),
            Self::InvalidRequest(msg) => LlmError::InvalidRequest(msg),
            Self::Provider {
                code,
                message,
                retryable,
            } => LlmError::Provider {
                code,
                message,
                retryable,
            },
            Self::Timeout { elapsed_ms } => LlmError::Timeout { elapsed_ms },
            Self::ResponseFormat { message, raw } => LlmError::ResponseFormat { message, raw },
        }
    }
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let response_len = self.responses.lock().unwrap().len();
        let stream_len = self.stream_responses.lock().unwrap().len();
        let call_count = self.calls.lock().unwrap().len();
        f.debug_struct("MockProvider")
            .field("meta", &self.meta)
            .field("queued_responses", &response_len)
            .field("queued_streams", &stream_len)
            .field("recorded_calls", &call_count)
            .finish()
    }
}

impl MockProvider {
    /// Creates a new mock with the given metadata and empty queues.
    pub fn new(meta: ProviderMetadata) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            stream_responses: Mutex::new(VecDeque::new()),
            meta,
            calls: Arc::new(Mutex::new(Vec::new())),
            latency: Mutex::new(None),
        }
    }

    /// Enqueues a successful response for the next `generate` call.
    pub fn queue_response(&self, response: ChatResponse) -> &Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    /// Enqueues an error for the next `generate` call.
    pub fn queue_error(&self, error: MockError) -> &Self {
        self.responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Enqueues stream events for the next `stream` call.
    pub fn queue_stream(&self, events: Vec<StreamEvent>) -> &Self {
        self.stream_responses.lock().unwrap().push_back(Ok(events));
        self
    }

    /// Enqueues an error returned by the next `stream` call before any
    /// event is yielded.
    pub fn queue_stream_error(&self, error: MockError) -> &Self {
        self.stream_responses.lock().unwrap().push_back(Err(error));
        self
    }

    /// Makes every subsequent call sleep for `latency` before answering.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *self.latency.lock().unwrap() = Some(latency);
        self
    }

    /// Returns a clone of all `ChatParams` passed to `generate` or
    /// `stream`, in call order.
    pub fn recorded_calls(&self) -> Vec<ChatParams> {
        self.calls.lock().unwrap().clone()
    }

    fn record_call(&self, params: &ChatParams) {
        self.calls.lock().unwrap().push(params.clone());
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Provider for MockProvider {
    async fn generate(&self, params: &ChatParams) -> Result<ChatResponse, LlmError> {
        self.record_call(params);
        self.simulate_latency().await;
        let result = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockProvider: no queued responses remaining");
        result.map_err(MockError::into_llm_error)
    }

    async fn stream(&self, params: &ChatParams) -> Result<ChatStream, LlmError> {
        self.record_call(params);
        self.simulate_latency().await;
        let result = self
            .stream_responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("MockProvider: no queued stream responses remaining");
        let events = result.map_err(MockError::into_llm_error)?;
        let stream = futures::stream::iter(events.into_iter().map(Ok));
        Ok(Box::pin(stream))
    }

    fn metadata(&self) -> ProviderMetadata {
        self.meta.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::StopReason;
    use crate::provider::DynProvider;
    use crate::test_helpers::sample_response;
    use futures::StreamExt;

    fn test_metadata() -> ProviderMetadata {
        ProviderMetadata {
            name: "mock".into(),
            model: "test-model".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_generate_returns_queued_in_order() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("first"));
        mock.queue_response(sample_response("second"));

        let r1 = mock.generate(&ChatParams::default()).await.unwrap();
        let r2 = mock.generate(&ChatParams::default()).await.unwrap();
        assert_eq!(r1.content, "first");
        assert_eq!(r2.content, "second");
    }

    #[tokio::test]
    async fn test_mock_generate_error() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_error(MockError::Auth("bad key".into()));

        let result = mock.generate(&ChatParams::default()).await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
    }

    #[tokio::test]
    #[should_panic(expected = "no queued responses")]
    async fn test_mock_generate_empty_queue_panics() {
        let mock = MockProvider::new(test_metadata());
        let _ = mock.generate(&ChatParams::default()).await;
    }

    #[tokio::test]
    async fn test_mock_stream_returns_events() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_stream(vec![
            StreamEvent::TextDelta("hello".into()),
            StreamEvent::Done {
                stop_reason: StopReason::EndTurn,
            },
        ]);

        let stream = mock.stream(&ChatParams::default()).await.unwrap();
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(Result::is_ok));
    }

    #[tokio::test]
    async fn test_mock_stream_error() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_stream_error(MockError::Http {
            status: Some(http::StatusCode::BAD_GATEWAY),
            message: "upstream".into(),
            retryable: true,
        });
        let result = mock.stream(&ChatParams::default()).await;
        assert!(matches!(result, Err(LlmError::Http { .. })));
    }

    #[tokio::test]
    async fn test_mock_records_params() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("ok"));
        let params = ChatParams {
            temperature: Some(0.5),
            system: Some("be nice".into()),
            ..Default::default()
        };
        let _ = mock.generate(&params).await;

        let recorded = mock.recorded_calls();
        assert_eq!(recorded[0].temperature, Some(0.5));
        assert_eq!(recorded[0].system.as_deref(), Some("be nice"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_latency_delays_answer() {
        let mock = MockProvider::new(test_metadata());
        mock.set_latency(Duration::from_secs(5));
        mock.queue_response(sample_response("late"));

        let start = tokio::time::Instant::now();
        mock.generate(&ChatParams::default()).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dyn_provider_blanket_impl() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("from box"));

        let boxed: Box<dyn DynProvider> = Box::new(mock);
        let result = boxed.generate_boxed(&ChatParams::default()).await.unwrap();
        assert_eq!(result.content, "from box");
        assert_eq!(boxed.metadata().model, "test-model");
    }

    #[test]
    fn test_mock_provider_debug() {
        let mock = MockProvider::new(test_metadata());
        mock.queue_response(sample_response("a"));
        let debug = format!("{mock:?}");
        assert!(debug.contains("queued_responses: 1"));
        assert!(debug.contains("recorded_calls: 0"));
    }
}
