use crate::metrics::{compute_snapshot, ResidualValue};
use crate::router::intent::{classify_intent, detect_focus_metric, IntentKeywords};
use fund_core::{
    ContextBundle, ConversationTurn, FundId, QueryIntent, ScoredChunk, TransactionLedger,
};
use std::cmp::Ordering;
use std::sync::Arc;

pub const MAX_CONTEXT_CHUNKS: usize = 3;
pub const MAX_HISTORY_TURNS: usize = 3;

/// Turns a question into the context bundle handed to answer generation.
///
/// Never talks to the text generator; the only collaborator is the ledger, read for
/// calculation questions.
pub struct QueryRouter {
    keywords: IntentKeywords,
    ledger: Arc<dyn TransactionLedger>,
    residual: Option<ResidualValue>,
}

impl QueryRouter {
    pub fn new(ledger: Arc<dyn TransactionLedger>) -> Self {
        Self::with_keywords(ledger, IntentKeywords::default())
    }

    pub fn with_keywords(ledger: Arc<dyn TransactionLedger>, keywords: IntentKeywords) -> Self {
        Self {
            keywords,
            ledger,
            residual: None,
        }
    }

    /// NAV to include as the final IRR inflow in calculation answers
    pub fn with_residual_value(mut self, residual: Option<ResidualValue>) -> Self {
        self.residual = residual;
        self
    }

    pub fn keywords(&self) -> &IntentKeywords {
        &self.keywords
    }

    pub fn classify(&self, query: &str) -> QueryIntent {
        classify_intent(query, &self.keywords)
    }

    pub fn assemble_context(
        &self,
        query: &str,
        fund_id: FundId,
        retrieved: Vec<ScoredChunk>,
        history: &[ConversationTurn],
    ) -> ContextBundle {
        let intent = self.classify(query);
        let focus_metric = detect_focus_metric(query, &self.keywords);
        let mut notes = Vec::new();

        let metrics = if intent == QueryIntent::Calculation {
            match self.ledger.fetch_transactions(fund_id) {
                Ok(records) => Some(compute_snapshot(fund_id, &records, self.residual)),
                Err(e) => {
                    tracing::warn!("Metrics unavailable for fund {}: {}", fund_id, e);
                    notes.push(format!("Metrics could not be computed: {}", e));
                    None
                }
            }
        } else {
            None
        };

        let chunks = top_chunks(retrieved, fund_id);

        let skip = history.len().saturating_sub(MAX_HISTORY_TURNS);
        let history = history[skip..].to_vec();

        tracing::info!(
            "Routed query as {:?} (focus {:?}): {} chunks, metrics={}, history={}",
            intent,
            focus_metric,
            chunks.len(),
            metrics.is_some(),
            history.len()
        );

        ContextBundle {
            query: query.to_string(),
            fund_id,
            intent,
            focus_metric,
            chunks,
            metrics,
            history,
            notes,
        }
    }
}

/// Highest-scoring chunks of `fund_id`; ties keep retrieval order
fn top_chunks(retrieved: Vec<ScoredChunk>, fund_id: FundId) -> Vec<ScoredChunk> {
    let total = retrieved.len();
    let mut chunks: Vec<ScoredChunk> = retrieved
        .into_iter()
        .filter(|c| c.chunk.fund_id == fund_id)
        .collect();
    if chunks.len() < total {
        tracing::debug!(
            "Dropped {} retrieved chunks belonging to other funds",
            total - chunks.len()
        );
    }
    chunks.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    chunks.truncate(MAX_CONTEXT_CHUNKS);
    chunks
}
