mod embedding;
pub mod error;
mod llm;
pub mod providers;

pub use embedding::{
    embeddings_from_config, Embedding, Embeddings, MockEmbeddings, OllamaEmbeddings, OpenAIEmbeddings,
};
pub use error::{EmbeddingError, LlmError};
pub use llm::{clean_completion, GenerationParams, OllamaConfig, DEFAULT_TIMEOUT, LLM};
pub use providers::{
    from_config, AnthropicProvider, GoogleGenAIProvider, OllamaProvider, OpenAIProvider,
    ProviderKind, SambaNovaProvider, SAMBANOVA_DEFAULT_MODEL,
};
