//! In-memory [`VectorIndex`] for tests and offline runs.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Search is brute-force cosine
//! similarity over every stored vector.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::index::{IndexEntry, VectorIndex};
use crate::models::ScoredDocument;

pub struct InMemoryIndex {
    collection: String,
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new("memory")
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn rebuild(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut stored = self.entries.write().map_err(|_| poisoned())?;
        *stored = entries.to_vec();
        Ok(())
    }

    async fn append(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut stored = self.entries.write().map_err(|_| poisoned())?;
        stored.extend_from_slice(entries);
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let stored = self.entries.read().map_err(|_| poisoned())?;
        let mut scored: Vec<ScoredDocument> = stored
            .iter()
            .map(|entry| ScoredDocument {
                document: entry.document.clone(),
                score: cosine_similarity(vector, &entry.vector),
            })
            .collect();
        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        Ok(scored)
    }
}
