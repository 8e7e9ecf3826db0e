/// Question answering service tests
///
/// Uses in-process retriever and generator doubles to check that:
/// 1. A working LLM answers from the formatted prompt
/// 2. LLM or retrieval failures fall back to deterministic answers
/// 3. No LLM configured still yields metric and definition answers
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use fund_analytics::llm::{ChunkRetriever, LlmProvider, LlmResponse, TextGenerator};
use fund_analytics::qa::{AnswerSource, FundQaService};
use fund_analytics::router::QueryRouter;
use fund_core::{
    FundId, InMemoryLedger, ScoredChunk, TextChunk, TransactionCategory, TransactionLedger,
    TransactionRecord,
};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

struct FixedRetriever {
    chunks: Vec<ScoredChunk>,
}

#[async_trait]
impl ChunkRetriever for FixedRetriever {
    async fn retrieve(&self, _query: &str, _fund_id: FundId, top_k: usize) -> Result<Vec<ScoredChunk>> {
        Ok(self.chunks.iter().take(top_k).cloned().collect())
    }
}

struct FailingRetriever;

#[async_trait]
impl ChunkRetriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _fund_id: FundId, _top_k: usize) -> Result<Vec<ScoredChunk>> {
        Err(anyhow!("qdrant unreachable"))
    }
}

/// Records prompts and answers with a canned reply
struct EchoGenerator {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(LlmResponse {
            raw_response: "The fund's DPI is 0.50x.".to_string(),
            model: "test-model".to_string(),
            tokens_used: Some(12),
            provider: LlmProvider::OpenAI,
        })
    }
}

struct FailingGenerator;

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str) -> Result<LlmResponse> {
        Err(anyhow!("rate limited"))
    }
}

fn chunk(sequence_index: usize, score: f32, content: &str) -> ScoredChunk {
    ScoredChunk {
        chunk: TextChunk {
            content: content.to_string(),
            document_id: 4,
            fund_id: 1,
            sequence_index,
            overlap_with_previous: sequence_index > 0,
            overlap_len: 0,
            page: Some(2),
        },
        score,
    }
}

fn router() -> QueryRouter {
    let ledger = Arc::new(InMemoryLedger::new());
    let records = vec![
        TransactionRecord::new(
            TransactionCategory::CapitalCall,
            NaiveDate::from_ymd_opt(2021, 3, 1),
            Decimal::from(2_000_000),
            "2021-03-01 | 2,000,000".to_string(),
            1,
            4,
        ),
        TransactionRecord::new(
            TransactionCategory::Distribution,
            NaiveDate::from_ymd_opt(2023, 3, 1),
            Decimal::from(1_000_000),
            "2023-03-01 | 1,000,000".to_string(),
            1,
            4,
        ),
    ];
    ledger.commit_batch(1, 4, &records).unwrap();
    QueryRouter::new(ledger)
}

fn retriever() -> Arc<FixedRetriever> {
    Arc::new(FixedRetriever {
        chunks: vec![
            chunk(0, 0.61, "The first close was held in March 2021."),
            chunk(1, 0.87, "A partial exit returned $1 million to investors."),
        ],
    })
}

#[cfg(test)]
mod qa_tests {
    use super::*;

    #[tokio::test]
    async fn test_llm_answer_uses_prompt_with_metrics() {
        let generator = Arc::new(EchoGenerator {
            prompts: Mutex::new(Vec::new()),
        });
        let service = FundQaService::new(router())
            .with_retriever(retriever())
            .with_generator(generator.clone());

        let answer = service.ask("Calculate the current DPI", 1, &[]).await;

        assert_eq!(answer.answer, "The fund's DPI is 0.50x.");
        assert_eq!(
            answer.source,
            AnswerSource::Llm {
                model: "test-model".to_string()
            }
        );
        assert!(!answer.metrics.used_fallback);
        assert_eq!(answer.metrics.num_chunks, 2);
        assert_eq!(answer.metrics.similarity_max, Some(0.87));

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("DPI: 0.50x"));
        assert!(prompts[0].contains("partial exit"));
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let service = FundQaService::new(router())
            .with_retriever(retriever())
            .with_generator(Arc::new(FailingGenerator));

        let answer = service.ask("Calculate the current DPI", 1, &[]).await;

        assert_eq!(answer.source, AnswerSource::Fallback);
        assert!(answer.metrics.used_fallback);
        assert_eq!(
            answer.answer,
            "DPI is 0.50x ($1,000,000.00 distributed on $2,000,000.00 paid in)."
        );
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_noted() {
        let service = FundQaService::new(router()).with_retriever(Arc::new(FailingRetriever));

        let answer = service.ask("Show me all distributions", 1, &[]).await;

        assert!(answer.context.chunks.is_empty());
        assert!(answer
            .context
            .notes
            .iter()
            .any(|n| n.contains("qdrant unreachable")));
        assert!(answer.answer.starts_with("No matching document passages"));
    }

    #[tokio::test]
    async fn test_without_llm_definitions_and_listings() {
        let service = FundQaService::new(router()).with_retriever(retriever());

        let definition = service.ask("What does IRR mean?", 1, &[]).await;
        assert!(definition.answer.starts_with("Internal Rate of Return (IRR)"));
        assert!(definition.context.metrics.is_none());

        let listing = service.ask("Show me all exits", 1, &[]).await;
        let first = listing.answer.lines().nth(1).unwrap();
        assert!(first.starts_with("1. A partial exit"));
    }
}
