//! Core data models shared by the ingestion and query paths.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key naming the file a document came from.
pub const SOURCE_KEY: &str = "source";

/// A unit of indexed text plus its metadata.
///
/// `metadata` always carries a [`SOURCE_KEY`] entry; loaders set it to the
/// originating file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self {
            content: content.into(),
            metadata,
        }
    }

    pub fn source(&self) -> &str {
        self.metadata
            .get(SOURCE_KEY)
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    /// First `max_chars` characters of the content, for citations.
    pub fn excerpt(&self, max_chars: usize) -> String {
        self.content.chars().take(max_chars).collect()
    }
}

/// A file handed to the upload path as an in-memory buffer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// A document returned from similarity search with its backend score.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_recorded_in_metadata() {
        let doc = Document::new("the parthenon", "athens.txt");
        assert_eq!(doc.source(), "athens.txt");
        assert_eq!(doc.metadata.get("source").unwrap(), "athens.txt");
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let doc = Document::new("αβγδε plain", "greek.txt");
        assert_eq!(doc.excerpt(3), "αβγ");
        assert_eq!(doc.excerpt(100), "αβγδε plain");
    }
}
