use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

use crate::external::{GenerationParams, OllamaConfig, ProviderKind, SAMBANOVA_DEFAULT_MODEL};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_k: Option<u32>,
    pub top_p: Option<f32>,
    pub request_timeout_secs: u64,
}

impl LlmConfig {
    /// Generation parameters without a credential
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            model: self.model.clone(),
            api_key: None,
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_k: self.top_k,
            top_p: self.top_p,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::SambaNova,
            model: SAMBANOVA_DEFAULT_MODEL.to_string(),
            base_url: None,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            top_k: None,
            top_p: None,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    #[default]
    Mock,
    Ollama,
    OpenAI,
}

impl FromStr for EmbeddingKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(format!("unknown embedding kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub kind: EmbeddingKind,
    pub model: String,
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            kind: EmbeddingKind::Mock,
            model: "nomic-embed-text".to_string(),
            dimensions: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub ollama: OllamaConfig,
    pub agent: AgentConfig,
    pub log_level: String,
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parsed value, or `None` when unset or unparsable
fn parsed<T: FromStr>(name: &str) -> Option<T> {
    var(name).and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let llm_defaults = LlmConfig::default();
        let provider = match var("LLM_PROVIDER") {
            Some(value) => value.parse::<ProviderKind>().map_err(|e| anyhow!(e))?,
            None => llm_defaults.provider,
        };

        let llm = LlmConfig {
            provider,
            model: var("LLM_MODEL").unwrap_or(llm_defaults.model),
            base_url: var("LLM_BASE_URL"),
            system_prompt: var("LLM_SYSTEM_PROMPT"),
            temperature: parsed("LLM_TEMPERATURE"),
            max_tokens: parsed("LLM_MAX_TOKENS"),
            top_k: parsed("LLM_TOP_K"),
            top_p: parsed("LLM_TOP_P"),
            request_timeout_secs: parsed("LLM_TIMEOUT_SECS")
                .unwrap_or(llm_defaults.request_timeout_secs),
        };

        let embedding_defaults = EmbeddingConfig::default();
        let embedding = EmbeddingConfig {
            kind: match var("EMBEDDING_KIND") {
                Some(value) => value.parse::<EmbeddingKind>().map_err(|e| anyhow!(e))?,
                None => embedding_defaults.kind,
            },
            model: var("EMBEDDING_MODEL").unwrap_or(embedding_defaults.model),
            dimensions: parsed("EMBEDDING_DIMENSIONS").unwrap_or(embedding_defaults.dimensions),
        };

        let ollama_defaults = OllamaConfig::default();
        let ollama = OllamaConfig {
            host: var("OLLAMA_HOST").unwrap_or(ollama_defaults.host),
            port: parsed("OLLAMA_PORT").unwrap_or(ollama_defaults.port),
        };
        ollama
            .get_url()
            .map_err(|e| anyhow!("Invalid Ollama URL: {}", e))?;

        let agent = AgentConfig {
            max_iterations: parsed("AGENT_MAX_ITERATIONS")
                .unwrap_or(crate::agent::DEFAULT_MAX_ITERATIONS),
        };

        Ok(Self {
            llm,
            embedding,
            ollama,
            agent,
            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }
}
