//! Top-k retrieval over the indexed collection.

use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::Document;

/// Number of documents retrieved per question.
pub const RETRIEVAL_TOP_K: usize = 3;

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Embed `query` and return the [`RETRIEVAL_TOP_K`] most similar
    /// documents, most similar first.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>> {
        let vector = embed_query(self.embedder.as_ref(), query).await?;
        let hits = self.index.search(&vector, RETRIEVAL_TOP_K).await?;
        debug!(
            collection = self.index.collection(),
            hits = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "retrieved context"
        );
        Ok(hits.into_iter().map(|h| h.document).collect())
    }
}

/// Join document contents with blank lines, in order.
pub fn format_docs(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_docs_separates_with_blank_lines() {
        let docs = vec![
            Document::new("first passage", "a.txt"),
            Document::new("second passage", "b.txt"),
        ];
        assert_eq!(format_docs(&docs), "first passage\n\nsecond passage");
    }

    #[test]
    fn format_docs_empty() {
        assert_eq!(format_docs(&[]), "");
    }
}
