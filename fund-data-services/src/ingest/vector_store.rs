use anyhow::{anyhow, Result};
use fund_core::{DocumentId, FundId, ScoredChunk, TextChunk};
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use qdrant_client::Qdrant;
use serde_json::json;
use std::collections::HashMap;
use tracing;
use uuid::Uuid;

pub const EMBEDDING_MODEL_NAME: &str = "bge-small-en-v1.5";
pub const EMBEDDING_DIM: u64 = 384;

/// Qdrant vector store for document text chunks
pub struct VectorStore {
    client: Qdrant,
    collection_name: String,
}

impl VectorStore {
    pub async fn new(qdrant_url: &str, collection_name: String) -> Result<Self> {
        let client = Qdrant::from_url(qdrant_url).build()?;

        tracing::info!("Connecting to Qdrant at {}", qdrant_url);

        Ok(Self {
            client,
            collection_name,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Create collection if it doesn't exist
    pub async fn create_collection_if_not_exists(&self, dimension: u64) -> Result<()> {
        if self.client.collection_exists(&self.collection_name).await? {
            tracing::debug!("Qdrant collection {} already exists", self.collection_name);
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection_name)
                    .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine)),
            )
            .await?;

        tracing::info!("Created Qdrant collection: {}", self.collection_name);
        Ok(())
    }

    pub async fn upsert_points(&self, points: Vec<PointStruct>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        tracing::info!("Upserting {} points to Qdrant", points.len());

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await?;

        Ok(())
    }

    /// Remove every chunk previously stored for a document (used before re-ingesting it)
    pub async fn delete_document(&self, fund_id: FundId, document_id: DocumentId) -> Result<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(document_filter(fund_id, document_id))
                    .wait(true),
            )
            .await?;

        tracing::debug!(
            "Deleted stored chunks for fund {} document {}",
            fund_id,
            document_id
        );
        Ok(())
    }

    /// Search for similar vectors
    pub async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        filter: Option<Filter>,
        score_threshold: Option<f32>,
    ) -> Result<Vec<ScoredPoint>> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection_name, query_vector, limit).with_payload(true);

        if let Some(f) = filter {
            search_builder = search_builder.filter(f);
        }

        if let Some(threshold) = score_threshold {
            search_builder = search_builder.score_threshold(threshold);
        }

        let search_result = self.client.search_points(search_builder).await?;

        Ok(search_result.result)
    }
}

/// Only chunks belonging to `fund_id`
pub fn fund_filter(fund_id: FundId) -> Filter {
    Filter::must([Condition::matches("fund_id", fund_id)])
}

/// Only chunks of one document of a fund
pub fn document_filter(fund_id: FundId, document_id: DocumentId) -> Filter {
    Filter::must([
        Condition::matches("fund_id", fund_id),
        Condition::matches("document_id", document_id),
    ])
}

/// Stable point id: a name-based UUID over the full `(fund, document, sequence)` key, so
/// re-ingesting a document overwrites only its own points
pub fn chunk_point_id(fund_id: FundId, document_id: DocumentId, sequence_index: usize) -> String {
    let key = format!("fund:{}/document:{}/chunk:{}", fund_id, document_id, sequence_index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
}

/// Helper to create a Qdrant point from a chunk
pub fn chunk_to_point(chunk: &TextChunk, embedding: Vec<f32>) -> PointStruct {
    let build_id = std::env::var("GIT_SHA").unwrap_or_else(|_| "dev".to_string());

    let mut payload = serde_json::Map::new();
    payload.insert("fund_id".to_string(), json!(chunk.fund_id));
    payload.insert("document_id".to_string(), json!(chunk.document_id));
    payload.insert("sequence_index".to_string(), json!(chunk.sequence_index));
    payload.insert("content".to_string(), json!(chunk.content));
    payload.insert(
        "overlap_with_previous".to_string(),
        json!(chunk.overlap_with_previous),
    );
    payload.insert("overlap_len".to_string(), json!(chunk.overlap_len));
    if let Some(page) = chunk.page {
        payload.insert("page".to_string(), json!(page));
    }

    // Provenance
    payload.insert("schema_version".to_string(), json!(1));
    payload.insert("embedding_model".to_string(), json!(EMBEDDING_MODEL_NAME));
    payload.insert("embedding_dim".to_string(), json!(EMBEDDING_DIM));
    payload.insert("build_id".to_string(), json!(build_id));

    PointStruct::new(
        chunk_point_id(chunk.fund_id, chunk.document_id, chunk.sequence_index),
        embedding,
        payload,
    )
}

/// Rebuild a chunk from a search hit's payload
pub fn point_to_chunk(point: &ScoredPoint) -> Result<ScoredChunk> {
    let payload = &point.payload;

    let chunk = TextChunk {
        content: payload_string(payload, "content")?,
        document_id: payload_i64(payload, "document_id")?,
        fund_id: payload_i64(payload, "fund_id")?,
        sequence_index: payload_i64(payload, "sequence_index")? as usize,
        overlap_with_previous: payload_bool(payload, "overlap_with_previous").unwrap_or(false),
        overlap_len: payload_i64(payload, "overlap_len").map(|v| v as usize).unwrap_or(0),
        page: payload_i64(payload, "page").ok().map(|v| v as u32),
    };

    Ok(ScoredChunk {
        chunk,
        score: point.score,
    })
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Result<i64> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::IntegerValue(i) => Some(*i),
            Kind::DoubleValue(d) => Some(*d as i64),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Missing or invalid field: {}", key))
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Result<String> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        })
        .ok_or_else(|| anyhow!("Missing or invalid field: {}", key))
}

fn payload_bool(payload: &HashMap<String, Value>, key: &str) -> Option<bool> {
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::BoolValue(b) => Some(*b),
            _ => None,
        })
}
