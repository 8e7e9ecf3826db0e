use crate::types::{FundId, MetricKind, MetricsSnapshot, ScoredChunk};
use serde::{Deserialize, Serialize};

/// What a question is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    Calculation,
    Definition,
    Retrieval,
    Unknown,
}

/// One prior question/answer exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// Everything the answer generator gets to see for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextBundle {
    pub query: String,
    pub fund_id: FundId,
    pub intent: QueryIntent,

    /// Metric the question names explicitly, if any
    pub focus_metric: Option<MetricKind>,

    /// Top retrieved chunks, highest score first
    pub chunks: Vec<ScoredChunk>,

    /// Present only for calculation questions
    pub metrics: Option<MetricsSnapshot>,

    /// Most recent turns, oldest first
    pub history: Vec<ConversationTurn>,

    /// Degradations while assembling (e.g. ledger unavailable)
    pub notes: Vec<String>,
}
