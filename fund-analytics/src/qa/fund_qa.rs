use crate::llm::{ChunkRetriever, FundPromptFormatter, MetricsTimer, QueryMetrics, TextGenerator};
use crate::router::QueryRouter;
use fund_core::{ContextBundle, ConversationTurn, FundId};
use std::sync::Arc;

/// Chunks requested from the retriever before the router keeps the best few
pub const RETRIEVAL_TOP_K: usize = 5;

/// Where an answer's text came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSource {
    Llm { model: String },
    Fallback,
}

#[derive(Debug, Clone)]
pub struct QaAnswer {
    pub answer: String,
    pub source: AnswerSource,
    pub context: ContextBundle,
    pub metrics: QueryMetrics,
}

/// Question answering over one fund: retrieve, route, then generate or fall back.
///
/// Always produces an answer; retrieval and generation failures degrade to the
/// deterministic fallback.
pub struct FundQaService {
    router: QueryRouter,
    retriever: Option<Arc<dyn ChunkRetriever>>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl FundQaService {
    pub fn new(router: QueryRouter) -> Self {
        Self {
            router,
            retriever: None,
            generator: None,
        }
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn ChunkRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn router(&self) -> &QueryRouter {
        &self.router
    }

    pub async fn ask(
        &self,
        query: &str,
        fund_id: FundId,
        history: &[ConversationTurn],
    ) -> QaAnswer {
        let mut metrics = QueryMetrics::new();
        let mut retrieval_note = None;

        let retrieved = match &self.retriever {
            Some(retriever) => {
                let timer = MetricsTimer::start();
                let result = retriever.retrieve(query, fund_id, RETRIEVAL_TOP_K).await;
                metrics.set_retrieval_latency(timer.stop());
                match result {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        tracing::warn!("Retrieval failed for fund {}: {}", fund_id, e);
                        retrieval_note = Some(format!("Document search unavailable: {}", e));
                        Vec::new()
                    }
                }
            }
            None => Vec::new(),
        };

        let timer = MetricsTimer::start();
        let mut context = self
            .router
            .assemble_context(query, fund_id, retrieved, history);
        metrics.set_routing_latency(timer.stop());
        context.notes.extend(retrieval_note);
        metrics.set_similarity_scores(context.chunks.iter().map(|c| c.score).collect());

        let (answer, source) = match &self.generator {
            Some(generator) => {
                let prompt = FundPromptFormatter::format_prompt(&context);
                let timer = MetricsTimer::start();
                let result = generator.generate(&prompt).await;
                metrics.set_llm_latency(timer.stop());

                match result {
                    Ok(response) => (
                        response.raw_response,
                        AnswerSource::Llm {
                            model: response.model,
                        },
                    ),
                    Err(e) => {
                        tracing::warn!("LLM unavailable, using fallback answer: {}", e);
                        (
                            FundPromptFormatter::fallback_answer(&context),
                            AnswerSource::Fallback,
                        )
                    }
                }
            }
            None => (
                FundPromptFormatter::fallback_answer(&context),
                AnswerSource::Fallback,
            ),
        };

        metrics.used_fallback = source == AnswerSource::Fallback;
        metrics.report();

        QaAnswer {
            answer,
            source,
            context,
            metrics,
        }
    }
}
