//! Per-question timing and retrieval quality
//!
//! Tracks how long retrieval and answer generation took, how similar the retrieved
//! chunks were, and whether the answer came from the LLM or the fallback path.

use std::time::{Duration, Instant};

/// Metrics for one answered question
#[derive(Debug, Clone, Default)]
pub struct QueryMetrics {
    /// Time taken to embed the question and search Qdrant (milliseconds)
    pub retrieval_latency_ms: u64,

    /// Time taken to route the question and compute metrics (milliseconds)
    pub routing_latency_ms: u64,

    /// Time taken for the LLM to answer (milliseconds)
    pub llm_latency_ms: u64,

    /// Similarity scores of the chunks placed in context
    pub similarity_scores: Vec<f32>,

    pub similarity_min: Option<f32>,
    pub similarity_max: Option<f32>,

    /// Number of chunks placed in context
    pub num_chunks: usize,

    /// Answer came from the deterministic fallback
    pub used_fallback: bool,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_retrieval_latency(&mut self, duration: Duration) {
        self.retrieval_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_routing_latency(&mut self, duration: Duration) {
        self.routing_latency_ms = duration.as_millis() as u64;
    }

    pub fn set_llm_latency(&mut self, duration: Duration) {
        self.llm_latency_ms = duration.as_millis() as u64;
    }

    /// Store scores and their range
    pub fn set_similarity_scores(&mut self, scores: Vec<f32>) {
        self.similarity_min = scores
            .iter()
            .copied()
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.similarity_max = scores
            .iter()
            .copied()
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        self.num_chunks = scores.len();
        self.similarity_scores = scores;
    }

    pub fn avg_similarity(&self) -> f32 {
        if self.similarity_scores.is_empty() {
            0.0
        } else {
            self.similarity_scores.iter().sum::<f32>() / self.similarity_scores.len() as f32
        }
    }

    pub fn total_latency_ms(&self) -> u64 {
        self.retrieval_latency_ms + self.routing_latency_ms + self.llm_latency_ms
    }

    /// Report metrics to tracing logs
    pub fn report(&self) {
        tracing::info!(
            "Query metrics: retrieval={}ms, routing={}ms, llm={}ms, total={}ms, chunks={}, avg_sim={:.2}, sim_range=[{:?},{:?}], fallback={}",
            self.retrieval_latency_ms,
            self.routing_latency_ms,
            self.llm_latency_ms,
            self.total_latency_ms(),
            self.num_chunks,
            self.avg_similarity(),
            self.similarity_min,
            self.similarity_max,
            self.used_fallback,
        );
    }
}

/// Timer helper for measuring operation latency
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn stop(self) -> Duration {
        self.start.elapsed()
    }
}
