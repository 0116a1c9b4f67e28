//! Milvus vector database client over the RESTful v2 API.
//!
//! Collections are created in Milvus "quick setup" mode, which enables
//! dynamic fields. The layout matches LangChain's Milvus store, so a
//! collection built by either side can be queried by the other:
//!
//! | Field | Type |
//! |-------|------|
//! | `pk` | Int64 primary key, auto id |
//! | `vector` | float vector, metric `COSINE` |
//! | `text` | dynamic, document content |
//! | `source` | dynamic, originating file name |
//!
//! Every call is a single awaited HTTP request. Failures propagate to the
//! caller; there is no retry.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::MilvusConfig;
use crate::index::{IndexEntry, VectorIndex};
use crate::models::{Document, ScoredDocument, SOURCE_KEY};

const PRIMARY_FIELD: &str = "pk";
const VECTOR_FIELD: &str = "vector";
const TEXT_FIELD: &str = "text";
const METRIC_TYPE: &str = "COSINE";
/// Rows per insert request, to stay under the server's request size limit.
const INSERT_BATCH: usize = 500;

/// Envelope shared by every v2 response: `code == 0` means success.
#[derive(Debug, Deserialize)]
struct MilvusResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

pub struct MilvusIndex {
    base_url: String,
    collection: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl MilvusIndex {
    /// Connect to Milvus and verify it answers for the configured collection.
    pub async fn connect(config: &MilvusConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let index = Self {
            base_url: config.base_url(),
            collection: config.collection_name.clone(),
            token: config.token.clone(),
            client,
        };
        let exists = index
            .has_collection()
            .await
            .with_context(|| format!("Failed to connect to Milvus at {}", index.base_url))?;
        debug!(collection = %index.collection, exists, "connected to Milvus");
        Ok(index)
    }

    async fn call(&self, endpoint: &str, body: Value) -> Result<Value> {
        let url = format!("{}/v2/vectordb/{}", self.base_url, endpoint);
        let mut request = self.client.post(&url).json(&body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Milvus {} failed with HTTP {}: {}", endpoint, status, body_text);
        }

        let parsed: MilvusResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid Milvus response from {}", endpoint))?;
        if parsed.code != 0 {
            bail!(
                "Milvus {} error {}: {}",
                endpoint,
                parsed.code,
                parsed.message.unwrap_or_default()
            );
        }
        Ok(parsed.data)
    }

    async fn has_collection(&self) -> Result<bool> {
        let data = self
            .call(
                "collections/has",
                json!({ "collectionName": self.collection }),
            )
            .await?;
        Ok(data.get("has").and_then(Value::as_bool).unwrap_or(false))
    }

    async fn drop_collection(&self) -> Result<()> {
        self.call(
            "collections/drop",
            json!({ "collectionName": self.collection }),
        )
        .await?;
        Ok(())
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        self.call(
            "collections/create",
            json!({
                "collectionName": self.collection,
                "dimension": dimension,
                "metricType": METRIC_TYPE,
                "idType": "Int64",
                "autoID": true,
                "primaryFieldName": PRIMARY_FIELD,
                "vectorFieldName": VECTOR_FIELD,
            }),
        )
        .await?;
        Ok(())
    }

    async fn insert(&self, entries: &[IndexEntry]) -> Result<()> {
        for batch in entries.chunks(INSERT_BATCH) {
            let rows: Vec<Value> = batch.iter().map(entry_to_row).collect();
            self.call(
                "entities/insert",
                json!({ "collectionName": self.collection, "data": rows }),
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for MilvusIndex {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn rebuild(&self, entries: &[IndexEntry]) -> Result<()> {
        let dimension = vector_dimension(entries)?;
        if self.has_collection().await? {
            self.drop_collection().await?;
        }
        self.create_collection(dimension).await?;
        self.insert(entries).await
    }

    async fn append(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        if !self.has_collection().await? {
            self.create_collection(vector_dimension(entries)?).await?;
        }
        self.insert(entries).await
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
        let data = self
            .call(
                "entities/search",
                json!({
                    "collectionName": self.collection,
                    "data": [vector],
                    "annsField": VECTOR_FIELD,
                    "limit": k,
                    "outputFields": ["*"],
                }),
            )
            .await?;
        parse_search_hits(&data)
    }
}

fn vector_dimension(entries: &[IndexEntry]) -> Result<usize> {
    let dimension = entries
        .first()
        .map(|e| e.vector.len())
        .ok_or_else(|| anyhow::anyhow!("cannot size a collection from zero entries"))?;
    if dimension == 0 || entries.iter().any(|e| e.vector.len() != dimension) {
        bail!("embedding vectors must share a non-zero dimension");
    }
    Ok(dimension)
}

fn entry_to_row(entry: &IndexEntry) -> Value {
    let mut row = serde_json::Map::new();
    for (key, value) in &entry.document.metadata {
        row.insert(key.clone(), Value::String(value.clone()));
    }
    row.insert(TEXT_FIELD.to_string(), Value::String(entry.document.content.clone()));
    row.insert(VECTOR_FIELD.to_string(), json!(entry.vector));
    Value::Object(row)
}

/// Turn search `data` (one object per hit) into scored documents.
///
/// Every string field other than `text` becomes metadata, so documents
/// inserted by other clients keep their attributes.
fn parse_search_hits(data: &Value) -> Result<Vec<ScoredDocument>> {
    let hits = data
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid Milvus search response: data is not an array"))?;

    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let fields = hit
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("Invalid Milvus search hit: {}", hit))?;
        let content = fields
            .get(TEXT_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let score = fields
            .get("distance")
            .and_then(Value::as_f64)
            .unwrap_or(0.0) as f32;

        let mut metadata = BTreeMap::new();
        for (key, value) in fields {
            if key == TEXT_FIELD || key == "distance" || key == PRIMARY_FIELD || key == VECTOR_FIELD
            {
                continue;
            }
            if let Some(s) = value.as_str() {
                metadata.insert(key.clone(), s.to_string());
            }
        }
        metadata
            .entry(SOURCE_KEY.to_string())
            .or_insert_with(|| "unknown".to_string());

        results.push(ScoredDocument {
            document: Document { content, metadata },
            score,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_carries_text_vector_and_metadata() {
        let entry = IndexEntry {
            document: Document::new("the minoans lived on crete", "minoans.txt"),
            vector: vec![0.6, 0.8],
        };
        let row = entry_to_row(&entry);
        assert_eq!(row["text"], "the minoans lived on crete");
        assert_eq!(row["source"], "minoans.txt");
        assert_eq!(row["vector"], json!([0.6f32, 0.8f32]));
        assert!(row.get("pk").is_none());
    }

    #[test]
    fn search_hits_become_documents() {
        let data = json!([
            { "pk": 1, "distance": 0.93, "text": "the minoans lived on crete", "source": "minoans.txt" },
            { "pk": 2, "distance": 0.41, "text": "sparta", "source": "sparta.txt", "page": "3" }
        ]);
        let hits = parse_search_hits(&data).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.source(), "minoans.txt");
        assert!((hits[0].score - 0.93).abs() < 1e-6);
        assert_eq!(hits[1].document.metadata.get("page").unwrap(), "3");
        assert!(!hits[1].document.metadata.contains_key("pk"));
    }

    #[test]
    fn hit_without_source_is_tagged_unknown() {
        let data = json!([{ "distance": 0.5, "text": "delphi" }]);
        let hits = parse_search_hits(&data).unwrap();
        assert_eq!(hits[0].document.source(), "unknown");
    }

    #[test]
    fn non_array_search_data_is_an_error() {
        assert!(parse_search_hits(&json!({ "oops": true })).is_err());
    }

    #[test]
    fn dimension_must_be_uniform() {
        let a = IndexEntry {
            document: Document::new("a", "a.txt"),
            vector: vec![1.0, 0.0],
        };
        let b = IndexEntry {
            document: Document::new("b", "b.txt"),
            vector: vec![1.0],
        };
        assert_eq!(vector_dimension(&[a.clone()]).unwrap(), 2);
        assert!(vector_dimension(&[a, b]).is_err());
        assert!(vector_dimension(&[]).is_err());
    }

    #[test]
    fn error_envelope_is_detected() {
        let parsed: MilvusResponse =
            serde_json::from_value(json!({ "code": 1100, "message": "collection not found" }))
                .unwrap();
        assert_eq!(parsed.code, 1100);
        assert_eq!(parsed.message.as_deref(), Some("collection not found"));
        assert!(parsed.data.is_null());
    }
}
