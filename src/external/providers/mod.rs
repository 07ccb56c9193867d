//! Concrete [`LLM`] backends and a config-driven factory.

mod anthropic;
mod google;
mod ollama;
mod openai;
mod openai_compat;
mod sambanova;

pub use anthropic::{AnthropicProvider, ANTHROPIC_BASE_URL};
pub use google::{GoogleGenAIProvider, GOOGLE_BASE_URL};
pub use ollama::OllamaProvider;
pub use openai::{OpenAIProvider, OPENAI_BASE_URL};
pub use sambanova::{SambaNovaProvider, SAMBANOVA_BASE_URL, SAMBANOVA_DEFAULT_MODEL};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc, time::Duration};
use tracing::info;

use crate::config::LlmConfig;
use crate::external::error::LlmError;
use crate::external::llm::{OllamaConfig, LLM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    SambaNova,
    OpenAI,
    Anthropic,
    Google,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SambaNova => "sambanova",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Ollama => "ollama",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sambanova" => Ok(Self::SambaNova),
            "openai" | "openrouter" => Ok(Self::OpenAI),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "google" | "gemini" | "googlegenai" => Ok(Self::Google),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown LLM provider '{}'", other)),
        }
    }
}

/// Build the provider described by `config`. `api_key` takes precedence
/// over the provider's environment variable.
pub fn from_config(
    config: &LlmConfig,
    ollama: &OllamaConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn LLM>, LlmError> {
    let mut params = config.params();
    params.api_key = api_key;
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let base_url = config.base_url.clone();

    info!(provider = %config.provider, model = %params.model, "initializing LLM provider");

    let llm: Arc<dyn LLM> = match config.provider {
        ProviderKind::SambaNova => {
            let mut provider = SambaNovaProvider::new(params)?.with_timeout(timeout)?;
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        ProviderKind::OpenAI => {
            let mut provider = OpenAIProvider::new(params)?.with_timeout(timeout)?;
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        ProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(params)?.with_timeout(timeout)?;
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        ProviderKind::Google => {
            let mut provider = GoogleGenAIProvider::new(params)?.with_timeout(timeout)?;
            if let Some(url) = base_url {
                provider = provider.with_base_url(url);
            }
            Arc::new(provider)
        }
        ProviderKind::Ollama => Arc::new(OllamaProvider::new(params, ollama)?),
    };

    Ok(llm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("SambaNova".parse::<ProviderKind>().unwrap(), ProviderKind::SambaNova);
        assert_eq!("openrouter".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!(" gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Google);
        assert!("bedrock".parse::<ProviderKind>().is_err());
        assert_eq!(ProviderKind::Anthropic.to_string(), "anthropic");
    }

    #[test]
    fn test_from_config_builds_requested_provider() {
        let config = LlmConfig {
            provider: ProviderKind::Anthropic,
            model: "claude-3-haiku".to_string(),
            ..LlmConfig::default()
        };
        let llm = from_config(&config, &OllamaConfig::default(), Some("key".into())).unwrap();
        assert_eq!(llm.provider(), "anthropic");
        assert_eq!(llm.default_params().model, "claude-3-haiku");

        let config = LlmConfig {
            provider: ProviderKind::Ollama,
            model: "llama3".to_string(),
            ..LlmConfig::default()
        };
        let llm = from_config(&config, &OllamaConfig::default(), None).unwrap();
        assert_eq!(llm.provider(), "ollama");
    }
}
