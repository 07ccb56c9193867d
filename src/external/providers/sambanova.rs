use async_trait::async_trait;
use std::time::Duration;

use super::openai_compat::ChatCompletions;
use crate::external::error::LlmError;
use crate::external::llm::{resolve_api_key, GenerationParams, LLM};

const PROVIDER: &str = "sambanova";
pub const SAMBANOVA_BASE_URL: &str = "https://api.sambanova.ai/v1";
pub const SAMBANOVA_DEFAULT_MODEL: &str = "Meta-Llama-3.1-8B-Instruct";
const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// SambaNova Cloud through its OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct SambaNovaProvider {
    params: GenerationParams,
    chat: ChatCompletions,
}

impl SambaNovaProvider {
    /// Resolves the key from `params.api_key`, then `SAMBANOVA_API_KEY`
    pub fn new(params: GenerationParams) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(PROVIDER, params.api_key.as_deref(), "SAMBANOVA_API_KEY")?;
        let mut params = params;
        params.api_key = Some(api_key);
        if params.model.is_empty() {
            params.model = SAMBANOVA_DEFAULT_MODEL.to_string();
        }
        if params.system_prompt.is_none() {
            params.system_prompt = Some(DEFAULT_SYSTEM_PROMPT.to_string());
        }

        Ok(Self {
            params,
            chat: ChatCompletions::new(PROVIDER, SAMBANOVA_BASE_URL, true)?,
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
impl LLM for SambaNovaProvider {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_filled_in() {
        let provider = SambaNovaProvider::new(GenerationParams::default().with_api_key("k")).unwrap();
        let params = provider.default_params();
        assert_eq!(params.model, SAMBANOVA_DEFAULT_MODEL);
        assert_eq!(params.system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(provider.provider(), "sambanova");
    }
}
