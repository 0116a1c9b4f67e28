//! Vector index abstraction over a named collection.
//!
//! The [`VectorIndex`] trait is the narrow interface to the vector database:
//! drop-and-rebuild, append, and top-k similarity search. Backends:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`MilvusIndex`](crate::milvus::MilvusIndex) | Milvus over its REST v2 API |
//! | [`InMemoryIndex`](crate::memory::InMemoryIndex) | Brute-force cosine, for tests and offline runs |
//!
//! [`IndexClient`] couples an index with an [`EmbeddingProvider`] and is what
//! the ingestion commands and the chat controller hold.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::milvus::MilvusIndex;
use crate::models::{Document, ScoredDocument};
use crate::retriever::Retriever;

/// A document paired with its embedding, ready for insertion.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub document: Document,
    pub vector: Vec<f32>,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Collection this index reads and writes.
    fn collection(&self) -> &str;

    /// Replace the collection's entire contents with `entries`.
    async fn rebuild(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Insert `entries`, creating the collection if it does not exist.
    async fn append(&self, entries: &[IndexEntry]) -> Result<()>;

    /// Return up to `k` documents most similar to `vector`, best first.
    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>>;
}

/// Embedding provider plus vector index for one collection.
#[derive(Clone)]
pub struct IndexClient {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl IndexClient {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Build the client described by `config`, connecting to Milvus.
    pub async fn connect(config: &Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let index = MilvusIndex::connect(&config.milvus).await?;
        Ok(Self::new(embedder, Arc::new(index)))
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Embed `docs` and replace the collection with them.
    ///
    /// Returns the number of documents indexed. An empty set leaves the
    /// existing collection alone.
    pub async fn rebuild(&self, docs: Vec<Document>) -> Result<usize> {
        if docs.is_empty() {
            info!(collection = self.index.collection(), "no documents to index; rebuild skipped");
            return Ok(0);
        }
        let entries = self.embed_documents(docs).await?;
        self.index.rebuild(&entries).await?;
        info!(
            collection = self.index.collection(),
            documents = entries.len(),
            "collection rebuilt"
        );
        Ok(entries.len())
    }

    /// Embed `docs` and add them to the collection without dropping it.
    pub async fn append(&self, docs: Vec<Document>) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let entries = self.embed_documents(docs).await?;
        self.index.append(&entries).await?;
        info!(
            collection = self.index.collection(),
            documents = entries.len(),
            "documents appended"
        );
        Ok(entries.len())
    }

    /// A retriever bound to the existing collection. Does not touch contents.
    pub fn open_for_query(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.embedder), Arc::clone(&self.index))
    }

    async fn embed_documents(&self, docs: Vec<Document>) -> Result<Vec<IndexEntry>> {
        for doc in &docs {
            if doc.content.is_empty() || doc.source().is_empty() {
                bail!("refusing to index a document without content or source");
            }
        }
        let texts: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;
        if vectors.len() != docs.len() {
            bail!(
                "embedding provider returned {} vectors for {} documents",
                vectors.len(),
                docs.len()
            );
        }
        Ok(docs
            .into_iter()
            .zip(vectors)
            .map(|(document, vector)| IndexEntry { document, vector })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryIndex;

    /// Provider that drops the last input.
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        fn model_name(&self) -> &str {
            "short"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_rejected() {
        let store = Arc::new(InMemoryIndex::new("test"));
        let client = IndexClient::new(Arc::new(ShortProvider), store.clone());
        let docs = vec![
            Document::new("sparta", "sparta.txt"),
            Document::new("athens", "athens.txt"),
        ];

        let err = client.rebuild(docs.clone()).await.unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 documents"));
        let err = client.append(docs).await.unwrap_err();
        assert!(err.to_string().contains("1 vectors for 2 documents"));
        assert!(store.is_empty());
    }
}
