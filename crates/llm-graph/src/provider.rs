//! Provider trait and request types.
//!
//! This module defines two core abstractions:
//!
//! - **[`Provider`]**: the trait every model backend implements. It uses
//!   Rust 2024's native async-fn-in-traits, so implementations are plain
//!   `async fn`s.
//!
//! - **[`DynProvider`]**: an object-safe mirror of `Provider` that uses
//!   boxed futures. A blanket `impl<T: Provider> DynProvider for T`
//!   bridges the two, so any concrete provider can be stored as
//!   `Arc<dyn DynProvider>` inside an [`ExecutionGraph`](crate::ExecutionGraph).
//!
//! All request configuration lives in [`ChatParams`]. Tools are
//! described to the model with [`ToolDefinition`], whose parameters are
//! a [`JsonSchema`].

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::{ChatMessage, ChatResponse};
use crate::error::LlmError;
use crate::stream::ChatStream;

/// The core trait every model backend implements.
///
/// `Provider` is **not** object-safe because it returns `impl Future`.
/// For dynamic dispatch use [`DynProvider`]; every `Provider`
/// implements it automatically.
pub trait Provider: Send + Sync {
    /// Sends a chat completion request and returns the full response.
    fn generate(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<ChatResponse, LlmError>> + Send;

    /// Sends a chat completion request and returns a stream of events.
    fn stream(
        &self,
        params: &ChatParams,
    ) -> impl Future<Output = Result<ChatStream, LlmError>> + Send;

    /// Returns static metadata describing this provider instance.
    fn metadata(&self) -> ProviderMetadata;
}

/// Object-safe counterpart of [`Provider`] for dynamic dispatch.
///
/// ```rust,no_run
/// use llm_graph::{ChatMessage, ChatParams, DynProvider};
///
/// async fn ask(provider: &dyn DynProvider, question: &str) -> Option<String> {
///     let params = ChatParams {
///         messages: vec![ChatMessage::user(question)],
///         ..Default::default()
///     };
///     let resp = provider.generate_boxed(&params).await.ok()?;
///     resp.text().map(str::to_owned)
/// }
/// ```
pub trait DynProvider: Send + Sync {
    /// Boxed-future version of [`Provider::generate`].
    fn generate_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>>;

    /// Boxed-future version of [`Provider::stream`].
    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatStream, LlmError>> + Send + 'a>>;

    /// Returns static metadata describing this provider instance.
    fn metadata(&self) -> ProviderMetadata;
}

impl<T: Provider> DynProvider for T {
    fn generate_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatResponse, LlmError>> + Send + 'a>> {
        Box::pin(self.generate(params))
    }

    fn stream_boxed<'a>(
        &'a self,
        params: &'a ChatParams,
    ) -> Pin<Box<dyn Future<Output = Result<ChatStream, LlmError>> + Send + 'a>> {
        Box::pin(self.stream(params))
    }

    fn metadata(&self) -> ProviderMetadata {
        Provider::metadata(self)
    }
}

/// Describes a provider instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Human-readable provider name (e.g. `"openai"`).
    pub name: Cow<'static, str>,
    /// The model identifier.
    pub model: String,
}

/// Parameters for a chat completion request.
///
/// Use struct-update syntax for concise construction:
///
/// ```rust
/// use llm_graph::{ChatMessage, ChatParams};
///
/// let params = ChatParams {
///     messages: vec![ChatMessage::user("Hello")],
///     temperature: Some(0.1),
///     ..Default::default()
/// };
/// ```
///
/// [`timeout`](Self::timeout) is a transport concern and is skipped
/// during serialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatParams {
    /// The conversation history.
    pub messages: Vec<ChatMessage>,
    /// Tool definitions the model may invoke.
    pub tools: Option<Vec<ToolDefinition>>,
    /// Controls whether and how the model uses tools.
    pub tool_choice: Option<ToolChoice>,
    /// Sampling temperature (0.0 = deterministic).
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// System prompt prepended by the provider when the log has none.
    pub system: Option<String>,
    /// Per-request timeout.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

/// Controls whether the model should use tools and, if so, which ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ToolChoice {
    /// The model decides whether to call a tool.
    Auto,
    /// The model must not call any tools.
    None,
    /// The model must call at least one tool.
    Required,
    /// The model must call this specific tool.
    Specific(String),
}

fn default_may_suspend() -> bool {
    true
}

/// A tool the model can invoke.
///
/// Providers translate this into their native tool format. The
/// `may_suspend` flag is local metadata and never sent to a model:
/// non-suspending tools are executed inline by the registry while
/// suspending ones may run concurrently and are subject to the tool
/// timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool's name, matched exactly against [`ToolCall::name`](crate::ToolCall::name).
    pub name: String,
    /// Description shown to the model so it knows when to use the tool.
    pub description: String,
    /// JSON Schema describing the tool's expected input.
    pub parameters: JsonSchema,
    /// Whether execution may suspend (I/O, timers).
    #[serde(default = "default_may_suspend", skip_serializing)]
    pub may_suspend: bool,
}

impl ToolDefinition {
    /// Creates a suspending tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: JsonSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            may_suspend: true,
        }
    }

    /// Marks the tool as synchronous and non-suspending.
    #[must_use]
    pub fn non_suspending(mut self) -> Self {
        self.may_suspend = false;
        self
    }
}

/// A JSON Schema document used for tool parameters.
///
/// ```rust
/// use llm_graph::JsonSchema;
///
/// let schema = JsonSchema::new(serde_json::json!({
///     "type": "object",
///     "properties": { "city": { "type": "string" } },
///     "required": ["city"]
/// }));
/// assert_eq!(schema.as_value()["type"], "object");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema(Value);

impl JsonSchema {
    /// Creates a schema from a raw JSON value.
    pub fn new(schema: Value) -> Self {
        Self(schema)
    }

    /// Returns a reference to the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Derives a JSON Schema from a type implementing
    /// [`schemars::JsonSchema`].
    ///
    /// Requires the `schema` feature (enabled by default).
    #[cfg(feature = "schema")]
    pub fn from_type<T: schemars::JsonSchema>() -> Result<Self, serde_json::Error> {
        let schema = schemars::schema_for!(T);
        let value = serde_json::to_value(schema)?;
        Ok(Self(value))
    }

    /// Validates `value` against this schema.
    ///
    /// Returns [`LlmError::SchemaValidation`] listing every violation,
    /// or [`LlmError::InvalidRequest`] if the schema itself is malformed.
    ///
    /// Requires the `schema` feature (enabled by default).
    #[cfg(feature = "schema")]
    pub fn validate(&self, value: &Value) -> Result<(), LlmError> {
        let validator = jsonschema::validator_for(&self.0)
            .map_err(|e| LlmError::InvalidRequest(format!("invalid JSON schema: {e}")))?;
        let errors: Vec<String> = validator
            .iter_errors(value)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(LlmError::SchemaValidation {
                message: errors.join("; "),
                schema: self.0.clone(),
                actual: value.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_params_defaults() {
        let p = ChatParams::default();
        assert!(p.messages.is_empty());
        assert!(p.tools.is_none());
        assert!(p.tool_choice.is_none());
        assert!(p.temperature.is_none());
        assert!(p.timeout.is_none());
    }

    #[test]
    fn test_chat_params_serde_skips_timeout() {
        let p = ChatParams {
            messages: vec![ChatMessage::user("hi")],
            temperature: Some(0.1),
            timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let json = serde_json::to_string(&p).unwrap();
        let back: ChatParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.timeout, None);
        assert_eq!(back.temperature, Some(0.1));
        assert_eq!(back.messages.len(), 1);
    }

    #[test]
    fn test_tool_definition_defaults_to_suspending() {
        let def = ToolDefinition::new(
            "search",
            "Search the web",
            JsonSchema::new(serde_json::json!({"type": "object"})),
        );
        assert!(def.may_suspend);
        assert!(!def.non_suspending().may_suspend);
    }

    #[test]
    fn test_tool_definition_wire_form_omits_may_suspend() {
        let def = ToolDefinition::new(
            "clock",
            "Current time",
            JsonSchema::new(serde_json::json!({"type": "object"})),
        )
        .non_suspending();
        let json = serde_json::to_value(&def).unwrap();
        assert!(json.get("may_suspend").is_none());
        let back: ToolDefinition = serde_json::from_value(json).unwrap();
        assert!(back.may_suspend);
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_json_schema_from_type() {
        #[derive(schemars::JsonSchema)]
        struct WeatherArgs {
            #[allow(dead_code)]
            city: String,
        }
        let schema = JsonSchema::from_type::<WeatherArgs>().unwrap();
        let props = schema
            .as_value()
            .get("properties")
            .expect("should have properties");
        assert!(props.get("city").is_some());
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_json_schema_validate() {
        let schema = JsonSchema::new(serde_json::json!({
            "type": "object",
            "properties": { "x": {"type": "integer"} },
            "required": ["x"]
        }));
        assert!(schema.validate(&serde_json::json!({"x": 42})).is_ok());
        assert!(matches!(
            schema.validate(&serde_json::json!({})),
            Err(LlmError::SchemaValidation { .. })
        ));
        assert!(schema.validate(&serde_json::json!({"x": "nope"})).is_err());
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_json_schema_validate_invalid_schema() {
        let schema = JsonSchema::new(serde_json::json!({"type": "bogus_not_a_type"}));
        let result = schema.validate(&serde_json::json!(42));
        assert!(matches!(result, Err(LlmError::InvalidRequest(_))));
    }
}
