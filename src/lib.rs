pub mod agent;
pub mod cache;
pub mod chain;
pub mod config;
pub mod external;
pub mod loader;
pub mod memory;
pub mod prompt;
pub mod schema;
pub mod tokens;
pub mod vectorstore;

pub use agent::{AgentExecutor, AgentRun, FunctionTool, RetrieverTool, Tool, ToolError};
pub use cache::InMemoryCache;
pub use chain::{ChainError, LLMChain, MEMORY_KEY};
pub use config::Config;
pub use external::{
    EmbeddingError, Embeddings, GenerationParams, LlmError, MockEmbeddings, LLM,
};
pub use loader::{DirectoryLoader, Loader, MarkdownLoader, TextLoader};
pub use memory::{ConversationBufferMemory, Memory};
pub use prompt::{PromptError, PromptTemplate};
pub use schema::Document;
pub use tokens::TokenCalculator;
pub use vectorstore::{InMemoryVectorStore, ScoredDocument, VectorStore};
