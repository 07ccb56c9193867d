use async_trait::async_trait;
use ollama_rs::{
    generation::{completion::request::GenerationRequest, options::GenerationOptions},
    Ollama,
};
use tracing::debug;

use crate::external::error::LlmError;
use crate::external::llm::{clean_completion, empty_completion, GenerationParams, OllamaConfig, LLM};

const PROVIDER: &str = "ollama";

/// Local inference through an Ollama server. No credential is involved.
pub struct OllamaProvider {
    client: Ollama,
    params: GenerationParams,
}

impl OllamaProvider {
    pub fn new(params: GenerationParams, config: &OllamaConfig) -> Result<Self, LlmError> {
        if params.model.is_empty() {
            return Err(LlmError::invalid(PROVIDER, "a model name is required"));
        }
        let client = config
            .client()
            .map_err(|e| LlmError::invalid(PROVIDER, format!("invalid Ollama URL: {}", e)))?;

        Ok(Self { client, params })
    }

    fn options(params: &GenerationParams) -> GenerationOptions {
        let mut options = GenerationOptions::default();
        if let Some(temperature) = params.temperature {
            options = options.temperature(temperature);
        }
        if let Some(top_k) = params.top_k {
            options = options.top_k(top_k);
        }
        if let Some(top_p) = params.top_p {
            options = options.top_p(top_p);
        }
        if let Some(max_tokens) = params.max_tokens {
            options = options.num_predict(i32::try_from(max_tokens).unwrap_or(i32::MAX));
        }
        options
    }
}

#[async_trait]
impl LLM for OllamaProvider {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    fn default_params(&self) -> GenerationParams {
        self.params.clone()
    }

    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, LlmError> {
        let params = params.merged_over(&self.params);

        let mut request = GenerationRequest::new(params.model.clone(), prompt.to_string());
        request.options = Some(Self::options(&params));
        request.system = params.system_prompt.clone();

        debug!(provider = PROVIDER, model = %params.model, "sending generate request");
        let response = self
            .client
            .generate(request)
            .await
            .map_err(|e| LlmError::network(PROVIDER, e.to_string()))?;

        let text = clean_completion(&response.response);
        if text.is_empty() {
            return Err(empty_completion(PROVIDER));
        }
        Ok(text)
    }
}
