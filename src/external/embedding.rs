use async_trait::async_trait;
use ollama_rs::{generation::options::GenerationOptions, Ollama};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{EmbeddingConfig, EmbeddingKind};
use crate::external::error::{EmbeddingError, LlmError};
use crate::external::llm::{build_client, resolve_api_key, send_json, OllamaConfig, DEFAULT_TIMEOUT};

pub type Embedding = Vec<f32>;

/// Turns text into fixed-length vectors
#[async_trait]
pub trait Embeddings: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Embed a batch, one vector per input in the same order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_query(text).await?);
        }
        Ok(vectors)
    }

    /// Vector length when known ahead of the first call
    fn dimensions(&self) -> Option<usize>;
}

impl EmbeddingError {
    fn from_llm(provider: &str, err: LlmError) -> Self {
        EmbeddingError::Request {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Deterministic offline embeddings.
///
/// Each lower-cased alphanumeric word is hashed into one of `dimensions`
/// buckets with a hash-derived sign and the result is L2-normalised, so
/// texts sharing vocabulary land close together. Empty text maps to the
/// zero vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockEmbeddings {
    dimensions: usize,
}

impl MockEmbeddings {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = fnv1a(word.as_bytes());
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for MockEmbeddings {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embeddings for MockEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(self.embed(text))
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }
}

/// Embeddings served by a local Ollama model
pub struct OllamaEmbeddings {
    client: Ollama,
    model: String,
}

impl OllamaEmbeddings {
    pub fn new(model: impl Into<String>, config: &OllamaConfig) -> Result<Self, EmbeddingError> {
        let client = config.client().map_err(|e| EmbeddingError::Request {
            provider: "ollama".to_string(),
            message: format!("invalid Ollama URL: {}", e),
        })?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }
}

#[async_trait]
impl Embeddings for OllamaEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let response = self
            .client
            .generate_embeddings(
                self.model.clone(),
                text.to_string(),
                Some(GenerationOptions::default()),
            )
            .await
            .map_err(|e| EmbeddingError::Request {
                provider: "ollama".to_string(),
                message: e.to_string(),
            })?;

        if response.embeddings.is_empty() {
            return Err(EmbeddingError::InvalidResponse {
                provider: "ollama".to_string(),
                message: "empty embedding".to_string(),
            });
        }

        Ok(response.embeddings.into_iter().map(|x| x as f32).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Embedding,
}

/// OpenAI-compatible `POST {base_url}/embeddings`
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddings {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAIEmbeddings {
    /// Resolves the key from `api_key`, then `OPENAI_API_KEY`
    pub fn new(model: impl Into<String>, api_key: Option<&str>) -> Result<Self, EmbeddingError> {
        let api_key = resolve_api_key("openai", api_key, "OPENAI_API_KEY")
            .map_err(|e| EmbeddingError::from_llm("openai", e))?;
        let client =
            build_client("openai", DEFAULT_TIMEOUT).map_err(|e| EmbeddingError::from_llm("openai", e))?;

        Ok(Self {
            client,
            base_url: crate::external::providers::OPENAI_BASE_URL.to_string(),
            api_key,
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Embeddings for OpenAIEmbeddings {
    async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| EmbeddingError::InvalidResponse {
            provider: "openai".to_string(),
            message: "no embedding returned".to_string(),
        })
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        debug!(model = %self.model, batch = texts.len(), "requesting embeddings");

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            });
        let mut response: EmbeddingsResponse = send_json("openai", request)
            .await
            .map_err(|e| EmbeddingError::from_llm("openai", e))?;

        if response.data.len() != texts.len() {
            return Err(EmbeddingError::InvalidResponse {
                provider: "openai".to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    response.data.len()
                ),
            });
        }

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        None
    }
}

/// Build the embeddings backend described by `config`
pub fn embeddings_from_config(
    config: &EmbeddingConfig,
    ollama: &OllamaConfig,
) -> Result<Arc<dyn Embeddings>, EmbeddingError> {
    info!(kind = ?config.kind, model = %config.model, "initializing embeddings");
    let embeddings: Arc<dyn Embeddings> = match config.kind {
        EmbeddingKind::Mock => Arc::new(MockEmbeddings::new(config.dimensions)),
        EmbeddingKind::Ollama => Arc::new(OllamaEmbeddings::new(config.model.clone(), ollama)?),
        EmbeddingKind::OpenAI => Arc::new(OpenAIEmbeddings::new(config.model.clone(), None)?),
    };
    Ok(embeddings)
}
