use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fund_core::{FundId, ScoredChunk};
use fund_data_services::ingest::{fund_filter, point_to_chunk};
use fund_data_services::VectorStore;
use std::sync::Arc;

/// Similarity search over a fund's document chunks
#[async_trait]
pub trait ChunkRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, fund_id: FundId, top_k: usize) -> Result<Vec<ScoredChunk>>;
}

/// Qdrant-backed retriever using the same embedding model as ingestion
pub struct RagRetriever {
    embedding_model: TextEmbedding,
    vector_store: Arc<VectorStore>,
    score_threshold: Option<f32>,
}

impl RagRetriever {
    pub async fn new(vector_store: Arc<VectorStore>, score_threshold: Option<f32>) -> Result<Self> {
        tracing::info!("Initializing RAG retriever with BGE-small-en-v1.5 model...");

        let embedding_model =
            TextEmbedding::try_new(InitOptions::new(EmbeddingModel::BGESmallENV15))?;

        tracing::info!("RAG retriever initialized successfully");

        Ok(Self {
            embedding_model,
            vector_store,
            score_threshold,
        })
    }
}

#[async_trait]
impl ChunkRetriever for RagRetriever {
    async fn retrieve(&self, query: &str, fund_id: FundId, top_k: usize) -> Result<Vec<ScoredChunk>> {
        tracing::debug!(
            "Searching chunks: fund_id={}, top_k={}, query_len={}",
            fund_id,
            top_k,
            query.len()
        );

        let query_embedding = self
            .embedding_model
            .embed(vec![query.to_string()], None)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Failed to generate embedding"))?;

        let scored_points = self
            .vector_store
            .search(
                query_embedding,
                top_k as u64,
                Some(fund_filter(fund_id)),
                self.score_threshold,
            )
            .await?;

        let mut chunks = Vec::with_capacity(scored_points.len());
        for point in &scored_points {
            match point_to_chunk(point) {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => tracing::warn!("Skipping malformed search hit: {}", e),
            }
        }

        tracing::info!(
            "Retrieved {} chunks for fund {} (threshold {:?})",
            chunks.len(),
            fund_id,
            self.score_threshold
        );

        Ok(chunks)
    }
}
