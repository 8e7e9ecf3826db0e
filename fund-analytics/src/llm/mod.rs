pub mod llm_client;
pub mod prompt_formatter;
pub mod query_metrics;
pub mod rag_retriever;

// Re-export commonly used items
pub use llm_client::{LlmClient, LlmConfig, LlmProvider, LlmResponse, TextGenerator};
pub use prompt_formatter::{definition, format_amount, FundPromptFormatter};
pub use query_metrics::{MetricsTimer, QueryMetrics};
pub use rag_retriever::{ChunkRetriever, RagRetriever};
