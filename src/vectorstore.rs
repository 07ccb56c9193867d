//! Embedding-backed document index with k-nearest-neighbour search.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::external::{Embedding, EmbeddingError, Embeddings};
use crate::schema::Document;

/// A search hit and its similarity to the query (higher is closer)
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed and index `documents`, returning one generated id per document
    async fn add_documents(&self, documents: &[Document]) -> Result<Vec<String>, EmbeddingError>;

    /// The `k` closest documents, best first
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>, EmbeddingError> {
        Ok(self
            .similarity_search_with_score(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }

    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, EmbeddingError>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Cosine similarity; 0.0 when either vector has zero magnitude
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Cosine similarity for ranking. NaN (from overflowing components)
/// sorts last.
fn rank_score(query: &[f32], candidate: &[f32]) -> f32 {
    let score = cosine_similarity(query, candidate);
    if score.is_nan() {
        f32::NEG_INFINITY
    } else {
        score
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: String,
    document: Document,
    embedding: Embedding,
}

#[derive(Debug, Default)]
struct Index {
    entries: Vec<Entry>,
    dimension: Option<usize>,
}

/// Process-lifetime vector store.
///
/// Readers share a `RwLock`; a batch insert is embedded first and then
/// appended under a single write guard, so searches observe either none or
/// all of a batch.
pub struct InMemoryVectorStore {
    embeddings: Arc<dyn Embeddings>,
    index: RwLock<Index>,
}

impl InMemoryVectorStore {
    pub fn new(embeddings: Arc<dyn Embeddings>) -> Self {
        Self {
            embeddings,
            index: RwLock::new(Index::default()),
        }
    }

    /// Ids of the indexed documents in insertion order
    pub async fn ids(&self) -> Vec<String> {
        self.index
            .read()
            .await
            .entries
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    pub async fn dimension(&self) -> Option<usize> {
        self.index.read().await.dimension
    }
}

fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add_documents(&self, documents: &[Document]) -> Result<Vec<String>, EmbeddingError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = documents.iter().map(|d| d.page_content.clone()).collect();
        let vectors = self.embeddings.embed_documents(&texts).await?;
        if vectors.len() != documents.len() {
            return Err(EmbeddingError::InvalidResponse {
                provider: "embeddings".to_string(),
                message: format!(
                    "expected {} vectors, got {}",
                    documents.len(),
                    vectors.len()
                ),
            });
        }

        let mut index = self.index.write().await;
        let expected = index
            .dimension
            .or(self.embeddings.dimensions())
            .unwrap_or(vectors[0].len());
        for vector in &vectors {
            check_dimension(expected, vector)?;
        }
        index.dimension = Some(expected);

        let ids: Vec<String> = documents.iter().map(|_| Uuid::new_v4().to_string()).collect();
        index.entries.extend(
            documents
                .iter()
                .zip(vectors)
                .zip(&ids)
                .map(|((document, embedding), id)| Entry {
                    id: id.clone(),
                    document: document.clone(),
                    embedding,
                }),
        );

        info!(added = ids.len(), total = index.entries.len(), "documents indexed");
        Ok(ids)
    }

    #[instrument(skip(self, query), fields(query_len = query.len()))]
    async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredDocument>, EmbeddingError> {
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.embeddings.embed_query(query).await?;

        let index = self.index.read().await;
        if let Some(expected) = index.dimension {
            check_dimension(expected, &query_vector)?;
        }

        let mut scored: Vec<(f32, &Entry)> = index
            .entries
            .iter()
            .map(|entry| (rank_score(&query_vector, &entry.embedding), entry))
            .collect();

        // stable: equal scores keep insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(k);

        debug!(hits = scored.len(), "similarity search complete");
        Ok(scored
            .into_iter()
            .map(|(score, entry)| ScoredDocument {
                document: entry.document.clone(),
                score,
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.index.read().await.entries.len()
    }
}
