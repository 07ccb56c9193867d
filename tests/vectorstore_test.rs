use async_trait::async_trait;
use mini_langchain::external::Embedding;
use mini_langchain::{
    Document, EmbeddingError, Embeddings, InMemoryVectorStore, MockEmbeddings, VectorStore,
};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Embedder {}

    #[async_trait]
    impl Embeddings for Embedder {
        async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError>;
        fn dimensions(&self) -> Option<usize>;
    }
}

fn corpus() -> Vec<Document> {
    vec![
        Document::new("Rust ownership rules prevent data races").with_meta("source", "rust.md"),
        Document::new("Paris is the capital of France").with_meta("source", "geo.md"),
        Document::new("Tokio is an async runtime for Rust").with_meta("source", "tokio.md"),
        Document::new("Bananas are rich in potassium").with_meta("source", "food.md"),
    ]
}

async fn seeded_store() -> InMemoryVectorStore {
    let store = InMemoryVectorStore::new(Arc::new(MockEmbeddings::new(256)));
    store.add_documents(&corpus()).await.unwrap();
    store
}

#[tokio::test]
async fn test_indexed_text_is_its_own_best_match() {
    let store = seeded_store().await;
    for document in corpus() {
        let hits = store
            .similarity_search_with_score(&document.page_content, 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document, document);
        assert!((hits[0].score - 1.0).abs() < 1e-5);
    }
}

#[tokio::test]
async fn test_results_sorted_by_descending_score() {
    let store = seeded_store().await;
    let hits = store
        .similarity_search_with_score("async rust runtime", 4)
        .await
        .unwrap();

    assert_eq!(hits.len(), 4);
    assert_eq!(hits[0].document.source(), Some("tokio.md"));
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_k_larger_than_store_returns_everything() {
    let store = seeded_store().await;
    let hits = store.similarity_search("anything at all", 10).await.unwrap();
    assert_eq!(hits.len(), 4);
}

#[tokio::test]
async fn test_search_does_not_mutate() {
    let store = seeded_store().await;
    let first = store.similarity_search("rust", 2).await.unwrap();
    let second = store.similarity_search("rust", 2).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.len().await, 4);
}

#[tokio::test]
async fn test_empty_store_search() {
    let store = InMemoryVectorStore::new(Arc::new(MockEmbeddings::default()));
    assert!(store.is_empty().await);
    assert!(store
        .similarity_search_with_score("query", 3)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_embedding_failure_leaves_store_unchanged() {
    let mut embedder = MockEmbedder::new();
    embedder.expect_dimensions().return_const(Some(3usize));
    embedder.expect_embed_query().returning(|text| {
        if text.contains("fail") {
            Err(EmbeddingError::Request {
                provider: "mock".to_string(),
                message: "backend down".to_string(),
            })
        } else {
            Ok(vec![1.0, 0.0, 0.0])
        }
    });

    let store = InMemoryVectorStore::new(Arc::new(embedder));
    store.add_documents(&[Document::new("ok")]).await.unwrap();

    let err = store
        .add_documents(&[Document::new("fine"), Document::new("please fail")])
        .await
        .unwrap_err();
    assert!(matches!(err, EmbeddingError::Request { .. }));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_dimension_mismatch_on_insert_and_query() {
    let mut embedder = MockEmbedder::new();
    embedder.expect_dimensions().return_const(None::<usize>);
    embedder.expect_embed_query().returning(|text| {
        if text.starts_with("short") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![1.0, 0.0, 0.0])
        }
    });

    let store = InMemoryVectorStore::new(Arc::new(embedder));
    store.add_documents(&[Document::new("three dims")]).await.unwrap();
    assert_eq!(store.dimension().await, Some(3));

    let err = store
        .add_documents(&[Document::new("short one")])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EmbeddingError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    );
    assert_eq!(store.len().await, 1);

    let err = store.similarity_search("short query", 1).await.unwrap_err();
    assert!(matches!(err, EmbeddingError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn test_concurrent_search_during_insert() {
    let store = Arc::new(seeded_store().await);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            if i == 0 {
                store
                    .add_documents(&[
                        Document::new("Borrow checker explained"),
                        Document::new("Lifetimes in depth"),
                    ])
                    .await
                    .unwrap();
                None
            } else {
                let hits = store.similarity_search("rust", 10).await.unwrap();
                Some(hits.len())
            }
        }));
    }

    for handle in handles {
        if let Some(seen) = handle.await.unwrap() {
            // a batch is visible entirely or not at all
            assert!(seen == 4 || seen == 6, "saw {} documents", seen);
        }
    }
    assert_eq!(store.len().await, 6);
}
