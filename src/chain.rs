use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cache::InMemoryCache;
use crate::external::{GenerationParams, LlmError, LLM};
use crate::memory::Memory;
use crate::prompt::{PromptError, PromptTemplate};

/// Variable that receives the rendered conversation history
pub const MEMORY_KEY: &str = "history";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Prompt + LLM + optional memory, run as one `invoke`.
///
/// The pipeline is strictly load history, format, complete, save. The chain
/// itself holds no per-call state; anything shared (memory, cache) is
/// behind an `Arc` and must serialise its own access.
#[derive(Clone)]
pub struct LLMChain {
    prompt: PromptTemplate,
    llm: Arc<dyn LLM>,
    memory: Option<Arc<dyn Memory>>,
    cache: Option<Arc<InMemoryCache>>,
    params: GenerationParams,
}

impl LLMChain {
    pub fn new(prompt: PromptTemplate, llm: Arc<dyn LLM>) -> Self {
        Self {
            prompt,
            llm,
            memory: None,
            cache: None,
            params: GenerationParams::default(),
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_cache(mut self, cache: Arc<InMemoryCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Parameters overlaid on the provider's own for every call
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    #[instrument(skip(self, values), fields(provider = self.llm.provider()))]
    pub async fn invoke(&self, mut values: HashMap<String, String>) -> Result<String, ChainError> {
        let input_text = memory_input(&values);

        if let Some(memory) = &self.memory {
            let history = memory.load().await;
            if values.contains_key(MEMORY_KEY) {
                warn!("caller supplied '{}', replacing it with memory contents", MEMORY_KEY);
            }
            values.insert(MEMORY_KEY.to_string(), history);
        }

        let prompt = self.prompt.format(&values)?;

        let output = match &self.cache {
            Some(cache) => {
                let key = self.cache_key(&prompt);
                match cache.get(&key).await {
                    Some(hit) => {
                        debug!("cache hit");
                        hit
                    }
                    None => {
                        let output = self.llm.complete(&prompt, &self.params).await?;
                        cache.put(key, output.clone()).await;
                        output
                    }
                }
            }
            None => self.llm.complete(&prompt, &self.params).await?,
        };

        if let Some(memory) = &self.memory {
            memory.save(&input_text, &output).await;
        }

        Ok(output)
    }

    /// Provider, effective generation settings and the final prompt. The
    /// credential is never part of the key.
    fn cache_key(&self, prompt: &str) -> String {
        let params = self.params.merged_over(&self.llm.default_params());
        [
            self.llm.provider().to_string(),
            params.model,
            params.system_prompt.unwrap_or_default(),
            format!("{:?}", params.temperature),
            format!("{:?}", params.max_tokens),
            format!("{:?}", params.top_k),
            format!("{:?}", params.top_p),
            prompt.to_string(),
        ]
        .join("\u{1f}")
    }
}

/// Text recorded as the human side of a turn: the only non-history value,
/// else `input`, else every non-history value as sorted `key: value` lines
fn memory_input(values: &HashMap<String, String>) -> String {
    let mut inputs: Vec<(&String, &String)> = values
        .iter()
        .filter(|(key, _)| key.as_str() != MEMORY_KEY)
        .collect();

    if inputs.len() == 1 {
        return inputs[0].1.clone();
    }
    if let Some(input) = values.get("input") {
        return input.clone();
    }

    inputs.sort();
    inputs
        .into_iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join("\n")
}
