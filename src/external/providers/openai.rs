use async_trait::async_trait;
use std::time::Duration;

use super::openai_compat::ChatCompletions;
use crate::external::error::LlmError;
use crate::external::llm::{resolve_api_key, GenerationParams, LLM};

const PROVIDER: &str = "openai";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions. Any compatible gateway (OpenRouter, vLLM, ...)
/// works through [`OpenAIProvider::with_base_url`].
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    params: GenerationParams,
    chat: ChatCompletions,
}

impl OpenAIProvider {
    /// Resolves the key from `params.api_key`, then `OPENAI_API_KEY`
    pub fn new(params: GenerationParams) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(PROVIDER, params.api_key.as_deref(), "OPENAI_API_KEY")?;
        if params.model.is_empty() {
            return Err(LlmError::invalid(PROVIDER, "a model name is required"));
        }
        let mut params = params;
        params.api_key = Some(api_key);

        Ok(Self {
            params,
            chat: ChatCompletions::new(PROVIDER, OPENAI_BASE_URL, false)?,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.chat.set_base_url(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, LlmError> {
        self.chat.set_timeout(timeout)?;
        Ok(self)
    }
}

#[async_trait]
impl LLM for OpenAIProvider {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn default_params(&self) -> GenerationParams {
        self.params.clone()
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let params = params.merged_over(&self.params);
        self.chat.complete(prompt, &params).await
    }
}
