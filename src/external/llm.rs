use async_trait::async_trait;
use ollama_rs::Ollama;
use reqwest::{header::HeaderMap, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{env, fmt, time::Duration};
use tracing::debug;
use url::Url;

use crate::external::error::LlmError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-call tuning. Only `model` is required; absent values fall back to
/// whatever the provider was configured with, then to the provider's own
/// defaults.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_k(mut self, top_k: u32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Field-by-field overlay of `self` on top of `base`. An empty model
    /// name counts as unset.
    pub fn merged_over(&self, base: &GenerationParams) -> GenerationParams {
        GenerationParams {
            model: if self.model.is_empty() {
                base.model.clone()
            } else {
                self.model.clone()
            },
            api_key: self.api_key.clone().or_else(|| base.api_key.clone()),
            system_prompt: self
                .system_prompt
                .clone()
                .or_else(|| base.system_prompt.clone()),
            temperature: self.temperature.or(base.temperature),
            max_tokens: self.max_tokens.or(base.max_tokens),
            top_k: self.top_k.or(base.top_k),
            top_p: self.top_p.or(base.top_p),
        }
    }
}

impl fmt::Debug for GenerationParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationParams")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("system_prompt", &self.system_prompt)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_k", &self.top_k)
            .field("top_p", &self.top_p)
            .finish()
    }
}

/// A text-completion backend
#[async_trait]
pub trait LLM: Send + Sync {
    /// Short provider identifier used in errors, logs and cache keys
    fn provider(&self) -> &'static str;

    /// Parameters the provider was constructed with
    fn default_params(&self) -> GenerationParams;

    /// Complete `prompt`. `params` are overlaid on the provider's defaults.
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError>;

    /// Complete `prompt` with the provider's own parameters
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let params = self.default_params();
        self.complete(prompt, &params).await
    }
}

const SPECIAL_TOKENS: &[&str] = &[
    "<|eot_id|>",
    "<|end_of_text|>",
    "<|im_end|>",
    "<|endoftext|>",
    "<|end|>",
    "</s>",
];

const ROLE_TAGS: &[&str] = &["Assistant:", "AI:"];

/// Strip chat-template tokens and a leading role tag from a raw completion
pub fn clean_completion(raw: &str) -> String {
    let mut text = raw.to_string();
    for token in SPECIAL_TOKENS {
        if text.contains(token) {
            text = text.replace(token, "");
        }
    }

    let mut text = text.trim();
    for tag in ROLE_TAGS {
        if let Some(stripped) = text.strip_prefix(tag) {
            text = stripped.trim_start();
            break;
        }
    }
    text.trim_end().to_string()
}

/// Explicit key first, then the provider's environment variable
pub(crate) fn resolve_api_key(
    provider: &str,
    explicit: Option<&str>,
    env_var: &str,
) -> Result<String, LlmError> {
    if let Some(key) = explicit.filter(|k| !k.trim().is_empty()) {
        return Ok(key.to_string());
    }
    match env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::auth(
            provider,
            format!("no API key supplied and {} is not set", env_var),
        )),
    }
}

pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::network(provider, format!("failed to build HTTP client: {}", e)))
}

/// `Retry-After` given in whole seconds. HTTP-date values are ignored.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a prepared request and decode a JSON success body, classifying
/// every failure into the shared taxonomy.
pub(crate) async fn send_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
) -> Result<T, LlmError> {
    let response = request
        .send()
        .await
        .map_err(|e| LlmError::network(provider, e.to_string()))?;

    let status = response.status();
    debug!(provider, status = status.as_u16(), "provider responded");

    if !status.is_success() {
        let wait = retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::from_status(provider, status, body, wait));
    }

    let body = response
        .text()
        .await
        .map_err(|e| LlmError::network(provider, e.to_string()))?;

    serde_json::from_str(&body).map_err(|e| {
        LlmError::provider(
            provider,
            Some(status.as_u16()),
            format!("unexpected response body: {}", e),
        )
    })
}

/// A success response that carried no usable text
pub(crate) fn empty_completion(provider: &str) -> LlmError {
    LlmError::provider(provider, None, "response contained no completion text")
}

/// Location of a local Ollama server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
}

impl OllamaConfig {
    /// Full base URL of the Ollama service, with a scheme
    pub fn get_url(&self) -> Result<Url, url::ParseError> {
        let url = if self.host.starts_with("http://") || self.host.starts_with("https://") {
            format!("{}:{}", self.host.trim_end_matches('/'), self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        };
        Url::parse(&url)
    }

    pub(crate) fn client(&self) -> Result<Ollama, url::ParseError> {
        let url = self.get_url()?;
        let host = url.host_str().ok_or(url::ParseError::EmptyHost)?;
        Ok(Ollama::new(format!("{}://{}", url.scheme(), host), self.port))
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11434,
        }
    }
}
