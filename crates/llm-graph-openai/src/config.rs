//! Backend configuration.

use std::time::Duration;

use llm_graph::LlmError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for an OpenAI-compatible chat completions endpoint.
///
/// Works against any server speaking the same wire format (`OpenAI`,
/// `SiliconFlow`, vLLM, llama.cpp, ...). Use struct update syntax with
/// [`Default`]:
///
/// ```rust
/// use llm_graph_openai::OpenAiConfig;
///
/// let config = OpenAiConfig {
///     api_key: "sk-...".into(),
///     model: "Qwen/Qwen2.5-7B-Instruct".into(),
///     base_url: "https://api.siliconflow.cn/v1".into(),
///     ..Default::default()
/// };
/// ```
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key, sent as a bearer token. Required.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL; `/chat/completions` is appended.
    pub base_url: String,
    /// Optional `OpenAI-Organization` header.
    pub organization: Option<String>,
    /// Request timeout. `None` uses reqwest's default.
    pub timeout: Option<Duration>,
    /// Pre-configured HTTP client for connection pooling.
    /// When `None`, a new client is created.
    pub client: Option<reqwest::Client>,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("organization", &self.organization)
            .field("timeout", &self.timeout)
            .field("client", &self.client.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            organization: None,
            timeout: None,
            client: None,
        }
    }
}

impl OpenAiConfig {
    /// Reads `OPENAI_API_KEY`, `OPENAI_BASE_URL` and `OPENAI_MODEL`.
    pub fn from_env() -> Result<Self, LlmError> {
        Self::from_env_prefixed("OPENAI")
    }

    /// Reads `{prefix}_API_KEY` (required), `{prefix}_BASE_URL` and
    /// `{prefix}_MODEL`. Unset or empty optional values keep their
    /// defaults.
    ///
    /// ```rust,no_run
    /// use llm_graph_openai::OpenAiConfig;
    ///
    /// // SILICONFLOW_API_KEY, SILICONFLOW_BASE_URL, SILICONFLOW_MODEL
    /// let config = OpenAiConfig::from_env_prefixed("SILICONFLOW").unwrap();
    /// # let _ = config;
    /// ```
    pub fn from_env_prefixed(prefix: &str) -> Result<Self, LlmError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, LlmError> {
        let get = |name: &str| {
            lookup(&format!("{prefix}_{name}")).filter(|value| !value.trim().is_empty())
        };
        let api_key = get("API_KEY")
            .ok_or_else(|| LlmError::Auth(format!("{prefix}_API_KEY is not set")))?;

        let mut config = Self {
            api_key,
            ..Self::default()
        };
        if let Some(base_url) = get("BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = get("MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}
