use async_trait::async_trait;
use futures::future::BoxFuture;
use std::{fmt, future::Future, sync::Arc};
use thiserror::Error;

use crate::vectorstore::VectorStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool '{name}'. Available tools: {}", .available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// A named capability the agent may call mid-reasoning
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to request this tool
    fn name(&self) -> &str;

    /// One-line summary shown to the model in the tool catalog
    fn description(&self) -> &str;

    async fn call(&self, input: &str) -> Result<String, ToolError>;
}

type ToolFn = dyn Fn(String) -> BoxFuture<'static, Result<String, ToolError>> + Send + Sync;

/// Tool backed by an async closure
pub struct FunctionTool {
    name: String,
    description: String,
    func: Box<ToolFn>,
}

impl FunctionTool {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            func: Box::new(move |input| Box::pin(func(input))),
        }
    }
}

impl fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        (self.func)(input.to_string()).await
    }
}

/// Looks the input up in a vector store and returns the matching passages
pub struct RetrieverTool {
    name: String,
    description: String,
    store: Arc<dyn VectorStore>,
    k: usize,
}

impl RetrieverTool {
    pub fn new(store: Arc<dyn VectorStore>, k: usize) -> Self {
        Self {
            name: "retriever".to_string(),
            description: "Searches the document store and returns passages relevant to the input query."
                .to_string(),
            store,
            k,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.name = name.into();
        self.description = description.into();
        self
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, input: &str) -> Result<String, ToolError> {
        let query = input.trim();
        if query.is_empty() {
            return Err(ToolError::InvalidInput("empty search query".to_string()));
        }

        let documents = self
            .store
            .similarity_search(query, self.k)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

        if documents.is_empty() {
            return Ok("No relevant documents found.".to_string());
        }

        Ok(documents
            .iter()
            .map(|doc| doc.page_content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}
