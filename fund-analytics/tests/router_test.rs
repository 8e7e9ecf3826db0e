/// Query routing tests
///
/// Ensures that:
/// 1. Reference questions map to the expected intents
/// 2. Calculation questions carry a metrics snapshot and others do not
/// 3. Only the fund's own top chunks and the last three turns reach the bundle
/// 4. A failing ledger degrades to a note instead of an error
use chrono::NaiveDate;
use fund_analytics::router::{IntentKeywords, QueryRouter};
use fund_core::{
    ConversationTurn, InMemoryLedger, LedgerError, MetricKind, QueryIntent, ScoredChunk,
    TextChunk, TransactionCategory, TransactionLedger, TransactionRecord,
};
use rust_decimal::Decimal;
use std::sync::Arc;

struct UnavailableLedger;

impl TransactionLedger for UnavailableLedger {
    fn commit_batch(
        &self,
        _fund_id: i64,
        _document_id: i64,
        _records: &[TransactionRecord],
    ) -> Result<(), LedgerError> {
        Err(LedgerError::Storage("ledger offline".to_string()))
    }

    fn fetch_transactions(&self, _fund_id: i64) -> Result<Vec<TransactionRecord>, LedgerError> {
        Err(LedgerError::Storage("ledger offline".to_string()))
    }
}

fn chunk(fund_id: i64, sequence_index: usize, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: TextChunk {
            content: format!("Passage {} of fund {}", sequence_index, fund_id),
            document_id: 3,
            fund_id,
            sequence_index,
            overlap_with_previous: sequence_index > 0,
            overlap_len: 0,
            page: Some(1),
        },
        score,
    }
}

fn seeded_router() -> QueryRouter {
    let ledger = Arc::new(InMemoryLedger::new());
    let records = vec![
        TransactionRecord::new(
            TransactionCategory::CapitalCall,
            NaiveDate::from_ymd_opt(2022, 1, 10),
            Decimal::from(1_000_000),
            "2022-01-10 | 1,000,000".to_string(),
            1,
            3,
        ),
        TransactionRecord::new(
            TransactionCategory::Distribution,
            NaiveDate::from_ymd_opt(2023, 1, 10),
            Decimal::from(250_000),
            "2023-01-10 | 250,000".to_string(),
            1,
            3,
        ),
    ];
    ledger.commit_batch(1, 3, &records).unwrap();
    QueryRouter::new(ledger)
}

#[cfg(test)]
mod routing_tests {
    use super::*;

    #[test]
    fn test_reference_intents() {
        let router = seeded_router();
        assert_eq!(router.classify("Calculate the current DPI"), QueryIntent::Calculation);
        assert_eq!(router.classify("What does DPI mean?"), QueryIntent::Definition);
        assert_eq!(router.classify("Show me all capital calls"), QueryIntent::Retrieval);
        assert_eq!(router.classify("Thanks!"), QueryIntent::Unknown);
    }

    #[test]
    fn test_calculation_attaches_metrics() {
        let router = seeded_router();
        let bundle = router.assemble_context("Calculate the current DPI", 1, vec![], &[]);

        assert_eq!(bundle.intent, QueryIntent::Calculation);
        assert_eq!(bundle.focus_metric, Some(MetricKind::Dpi));
        let metrics = bundle.metrics.expect("calculation carries metrics");
        assert_eq!(metrics.pic, Decimal::from(1_000_000));
        assert_eq!(metrics.dpi.value(), Some(Decimal::new(25, 2)));
    }

    #[test]
    fn test_retrieval_has_no_metrics() {
        let router = seeded_router();
        let bundle = router.assemble_context("Show me all capital calls", 1, vec![], &[]);
        assert!(bundle.metrics.is_none());
        assert_eq!(bundle.focus_metric, None);
    }

    #[test]
    fn test_context_limits() {
        let router = seeded_router();
        let retrieved = vec![
            chunk(1, 0, 0.41),
            chunk(1, 1, 0.93),
            chunk(2, 2, 0.99),
            chunk(1, 3, 0.67),
            chunk(1, 4, 0.88),
        ];
        let history: Vec<ConversationTurn> = (1..=4)
            .map(|i| ConversationTurn::new(format!("question {}", i), format!("answer {}", i)))
            .collect();

        let bundle = router.assemble_context("List the fund's distributions", 1, retrieved, &history);

        let scores: Vec<f32> = bundle.chunks.iter().map(|c| c.score).collect();
        assert_eq!(scores, vec![0.93, 0.88, 0.67]);
        assert!(bundle.chunks.iter().all(|c| c.chunk.fund_id == 1));

        assert_eq!(bundle.history.len(), 3);
        assert_eq!(bundle.history[0].question, "question 2");
        assert_eq!(bundle.history[2].question, "question 4");
    }

    #[test]
    fn test_ledger_failure_becomes_note() {
        let router = QueryRouter::new(Arc::new(UnavailableLedger));
        let bundle = router.assemble_context("What is the IRR?", 1, vec![chunk(1, 0, 0.5)], &[]);

        assert_eq!(bundle.intent, QueryIntent::Calculation);
        assert!(bundle.metrics.is_none());
        assert_eq!(bundle.notes.len(), 1);
        assert!(bundle.notes[0].contains("ledger offline"));
        assert_eq!(bundle.chunks.len(), 1);
    }

    #[test]
    fn test_custom_keywords() {
        let keywords = IntentKeywords {
            calculation: fund_core::KeywordSet::new(["crunch"]),
            ..IntentKeywords::default()
        };
        let router = QueryRouter::with_keywords(Arc::new(InMemoryLedger::new()), keywords);
        assert_eq!(router.classify("Crunch the numbers"), QueryIntent::Calculation);
        assert_eq!(router.classify("Calculate the DPI"), QueryIntent::Unknown);
    }
}
