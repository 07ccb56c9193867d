use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::external::error::LlmError;
use crate::external::llm::{
    build_client, clean_completion, empty_completion, resolve_api_key, send_json,
    GenerationParams, DEFAULT_TIMEOUT, LLM,
};

const PROVIDER: &str = "anthropic";
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    params: GenerationParams,
    base_url: String,
    client: Client,
}

impl AnthropicProvider {
    /// Resolves the key from `params.api_key`, then `ANTHROPIC_API_KEY`
    pub fn new(params: GenerationParams) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(PROVIDER, params.api_key.as_deref(), "ANTHROPIC_API_KEY")?;
        if params.model.is_empty() {
            return Err(LlmError::invalid(PROVIDER, "a model name is required"));
        }
        let mut params = params;
        params.api_key = Some(api_key);

        Ok(Self {
            params,
            base_url: ANTHROPIC_BASE_URL.to_string(),
            client: build_client(PROVIDER, DEFAULT_TIMEOUT)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.client = build_client(PROVIDER, timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl LLM for AnthropicProvider {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn default_params(&self) -> GenerationParams {
        self.params.clone()
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let params = params.merged_over(&self.params);
        let api_key = params
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::auth(PROVIDER, "no API key configured"))?;

        let body = MessagesRequest {
            model: &params.model,
            max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            system: params.system_prompt.as_deref(),
            temperature: params.temperature,
            top_k: params.top_k,
            top_p: params.top_p,
        };

        let url = format!("{}/messages", self.base_url.trim_end_matches('/'));
        debug!(provider = PROVIDER, model = %params.model, "sending messages request");

        let request = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response: MessagesResponse = send_json(PROVIDER, request).await?;

        let text: String = response
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        let text = clean_completion(&text);
        if text.is_empty() {
            return Err(empty_completion(PROVIDER));
        }
        Ok(text)
    }
}
