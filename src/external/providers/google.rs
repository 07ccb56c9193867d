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

const PROVIDER: &str = "google";
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl GenerationConfig {
    fn from_params(params: &GenerationParams) -> Option<Self> {
        let config = Self {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
            top_k: params.top_k,
            top_p: params.top_p,
        };
        let empty = config.temperature.is_none()
            && config.max_output_tokens.is_none()
            && config.top_k.is_none()
            && config.top_p.is_none();
        (!empty).then_some(config)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Google Gemini `generateContent`
#[derive(Debug, Clone)]
pub struct GoogleGenAIProvider {
    params: GenerationParams,
    base_url: String,
    client: Client,
}

impl GoogleGenAIProvider {
    /// Resolves the key from `params.api_key`, then `GOOGLE_API_KEY`
    pub fn new(params: GenerationParams) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(PROVIDER, params.api_key.as_deref(), "GOOGLE_API_KEY")?;
        if params.model.is_empty() {
            return Err(LlmError::invalid(PROVIDER, "a model name is required"));
        }
        let mut params = params;
        params.api_key = Some(api_key);

        Ok(Self {
            params,
            base_url: GOOGLE_BASE_URL.to_string(),
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
impl LLM for GoogleGenAIProvider {
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

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: params.system_prompt.as_deref().map(|system| Content {
                role: None,
                parts: vec![Part { text: system }],
            }),
            generation_config: GenerationConfig::from_params(&params),
        };

        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            params.model
        );
        debug!(provider = PROVIDER, model = %params.model, "sending generateContent request");

        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body);
        let response: GenerateContentResponse = send_json(PROVIDER, request).await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let text = clean_completion(&text);
        if text.is_empty() {
            return Err(empty_completion(PROVIDER));
        }
        Ok(text)
    }
}
