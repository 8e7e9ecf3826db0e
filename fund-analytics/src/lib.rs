pub mod llm;
pub mod metrics;
pub mod qa;
pub mod router;

// Re-export commonly used items
pub use llm::{
    ChunkRetriever, FundPromptFormatter, LlmClient, LlmConfig, LlmProvider, LlmResponse,
    QueryMetrics, RagRetriever, TextGenerator,
};
pub use metrics::{
    breakdown, compute_dpi, compute_irr, compute_irr_with_residual, compute_pic,
    compute_snapshot, FundMetricsService, ResidualValue,
};
pub use qa::{AnswerSource, FundQaService, QaAnswer};
pub use router::{classify_intent, detect_focus_metric, IntentKeywords, QueryRouter};
