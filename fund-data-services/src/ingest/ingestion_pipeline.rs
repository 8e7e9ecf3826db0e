use anyhow::{Context, Result};
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fund_core::{
    DocumentId, FundId, IngestError, PipelineConfig, TextChunk, TransactionCategory,
    TransactionLedger, TransactionRecord,
};
use serde::Serialize;
use std::sync::Arc;
use tracing;

use super::extraction::ExtractionResult;
use super::table_classifier::TableClassifier;
use super::text_segmenter::TextSegmenter;
use super::vector_store::{chunk_to_point, VectorStore, EMBEDDING_DIM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Completed,
    /// Records and chunks were produced but some step reported an error
    CompletedWithErrors,
}

/// What happened to one document, for operators and the ingestion log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub fund_id: FundId,
    pub document_id: DocumentId,
    pub status: ProcessingStatus,
    pub pages_processed: usize,
    pub tables_found: usize,
    pub capital_calls: usize,
    pub distributions: usize,
    pub adjustments: usize,
    pub unknown_records: usize,
    pub skipped_rows: usize,

    /// Indexes of tables with fewer than two rows
    pub ignored_tables: Vec<usize>,

    /// Indexes of tables whose category could not be decided
    pub unknown_tables: Vec<usize>,

    /// Indexes of tables without an identifiable amount column
    pub tables_missing_amount: Vec<usize>,

    pub text_chunks: usize,
    pub chunks_indexed: usize,
    pub errors: Vec<String>,
}

impl ProcessingSummary {
    fn new(fund_id: FundId, document_id: DocumentId) -> Self {
        Self {
            fund_id,
            document_id,
            status: ProcessingStatus::Completed,
            pages_processed: 0,
            tables_found: 0,
            capital_calls: 0,
            distributions: 0,
            adjustments: 0,
            unknown_records: 0,
            skipped_rows: 0,
            ignored_tables: Vec::new(),
            unknown_tables: Vec::new(),
            tables_missing_amount: Vec::new(),
            text_chunks: 0,
            chunks_indexed: 0,
            errors: Vec::new(),
        }
    }

    fn count_record(&mut self, category: TransactionCategory) {
        match category {
            TransactionCategory::CapitalCall => self.capital_calls += 1,
            TransactionCategory::Distribution => self.distributions += 1,
            TransactionCategory::Adjustment => self.adjustments += 1,
            TransactionCategory::Unknown => self.unknown_records += 1,
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.status = ProcessingStatus::CompletedWithErrors;
    }
}

/// Output of the synchronous processing stage
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub records: Vec<TransactionRecord>,
    pub chunks: Vec<TextChunk>,
    pub summary: ProcessingSummary,
}

/// Tables → records and prose → chunks for one document. Pure.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    classifier: TableClassifier,
    segmenter: TextSegmenter,
}

impl DocumentProcessor {
    pub fn new(config: &PipelineConfig) -> Result<Self, IngestError> {
        Ok(Self {
            classifier: TableClassifier::new(config.table_keywords.clone(), config.date_locale),
            segmenter: TextSegmenter::new(config.segmenter)?,
        })
    }

    pub fn process(
        &self,
        extraction: &ExtractionResult,
        fund_id: FundId,
        document_id: DocumentId,
    ) -> Result<ProcessedDocument, IngestError> {
        if !extraction.has_content() {
            return Err(IngestError::UnsupportedDocument {
                document_id,
                reason: "no tables and no extractable text (scanned or image-only PDF?)"
                    .to_string(),
            });
        }

        let mut summary = ProcessingSummary::new(fund_id, document_id);
        summary.pages_processed = extraction.pages_with_text();
        summary.tables_found = extraction.tables.len();

        let mut records = Vec::new();
        for (table_idx, table) in extraction.tables.iter().enumerate() {
            let Some(table_result) = self.classifier.extract_records(table, fund_id, document_id)
            else {
                summary.ignored_tables.push(table_idx);
                continue;
            };

            if table_result.classification.category == TransactionCategory::Unknown {
                tracing::warn!(
                    "Table {} of document {} matches no transaction category",
                    table_idx,
                    document_id
                );
                summary.unknown_tables.push(table_idx);
            }
            if table_result.missing_amount_column {
                summary.tables_missing_amount.push(table_idx);
            }
            if table_result.skipped_rows > 0 {
                tracing::warn!(
                    "Skipped {} rows in table {} of document {}",
                    table_result.skipped_rows,
                    table_idx,
                    document_id
                );
            }

            summary.skipped_rows += table_result.skipped_rows;
            for record in &table_result.records {
                summary.count_record(record.category);
            }
            records.extend(table_result.records);
        }

        let chunks = self
            .segmenter
            .segment_document(&extraction.text_blocks, fund_id, document_id);
        summary.text_chunks = chunks.len();

        tracing::info!(
            "Processed document {}: {} tables, {} records ({} skipped rows), {} chunks",
            document_id,
            summary.tables_found,
            records.len(),
            summary.skipped_rows,
            summary.text_chunks
        );

        Ok(ProcessedDocument {
            records,
            chunks,
            summary,
        })
    }
}

/// Embedding model plus the Qdrant collection chunks go to
struct ChunkIndex {
    embedding_model: TextEmbedding,
    vector_store: Arc<VectorStore>,
}

/// Document ingestion pipeline that:
/// 1. Classifies tables into transaction records
/// 2. Commits the records to the ledger as one batch
/// 3. Segments the prose into chunks
/// 4. Embeds the chunks and uploads them to Qdrant (when a vector store is configured)
pub struct DocumentIngestionPipeline {
    processor: DocumentProcessor,
    ledger: Arc<dyn TransactionLedger>,
    chunk_index: Option<ChunkIndex>,
}

impl DocumentIngestionPipeline {
    /// Pipeline without a vector store: records go to the ledger, chunks are only counted
    pub fn new(config: &PipelineConfig, ledger: Arc<dyn TransactionLedger>) -> Result<Self> {
        let processor = DocumentProcessor::new(config).context("Invalid pipeline configuration")?;

        Ok(Self {
            processor,
            ledger,
            chunk_index: None,
        })
    }

    /// Pipeline that also embeds chunks and stores them in Qdrant
    pub async fn with_vector_store(
        config: &PipelineConfig,
        ledger: Arc<dyn TransactionLedger>,
        qdrant_url: &str,
        collection_name: String,
    ) -> Result<Self> {
        let mut pipeline = Self::new(config, ledger)?;

        // Downloads the BGE model on first run
        tracing::info!("Loading embedding model (BGE-small-en-v1.5)...");
        let embedding_model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(true),
        )?;

        let vector_store = Arc::new(VectorStore::new(qdrant_url, collection_name).await?);
        vector_store
            .create_collection_if_not_exists(EMBEDDING_DIM)
            .await?;

        tracing::info!("Ingestion pipeline initialized with vector store");

        pipeline.chunk_index = Some(ChunkIndex {
            embedding_model,
            vector_store,
        });
        Ok(pipeline)
    }

    /// Ingest one extracted document.
    ///
    /// Fails only for document-level problems (nothing extractable, ledger unavailable);
    /// row and table problems, as well as chunk upload failures, end up in the summary.
    pub async fn ingest(
        &mut self,
        extraction: &ExtractionResult,
        fund_id: FundId,
        document_id: DocumentId,
    ) -> Result<ProcessedDocument> {
        tracing::info!("Starting ingestion for fund {} document {}", fund_id, document_id);

        let mut processed = self.processor.process(extraction, fund_id, document_id)?;

        self.ledger
            .commit_batch(fund_id, document_id, &processed.records)
            .with_context(|| {
                format!(
                    "Failed to commit transactions of document {} to the ledger",
                    document_id
                )
            })?;
        tracing::info!(
            "Committed {} transactions for fund {}",
            processed.records.len(),
            fund_id
        );

        if let Some(index) = self.chunk_index.as_mut() {
            match index.store_chunks(&processed.chunks).await {
                Ok(stored) => processed.summary.chunks_indexed = stored,
                Err(e) => {
                    tracing::warn!("Failed to index chunks of document {}: {:#}", document_id, e);
                    processed
                        .summary
                        .record_error(format!("chunk indexing failed: {:#}", e));
                }
            }
        }

        tracing::info!("Ingestion complete for document {}: {:?}", document_id, processed.summary);
        Ok(processed)
    }
}

impl ChunkIndex {
    async fn store_chunks(&mut self, chunks: &[TextChunk]) -> Result<usize> {
        let Some(first) = chunks.first() else {
            return Ok(0);
        };

        // Re-ingestion may produce fewer chunks than last time
        self.vector_store
            .delete_document(first.fund_id, first.document_id)
            .await?;

        const BATCH_SIZE: usize = 100;
        let mut points = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();

            tracing::debug!("Generating embeddings for batch of {} chunks...", texts.len());
            let embeddings = self.embedding_model.embed(texts, None)?;

            for (chunk, embedding) in batch.iter().zip(embeddings) {
                points.push(chunk_to_point(chunk, embedding));
            }
        }

        let stored = points.len();
        self.vector_store.upsert_points(points).await?;
        tracing::info!("Uploaded {} chunk points to Qdrant", stored);

        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::extraction::TextBlock;
    use fund_core::{InMemoryLedger, RawTable};
    use rust_decimal::Decimal;

    fn extraction() -> ExtractionResult {
        ExtractionResult::new(
            vec![
                RawTable::from_rows(vec![
                    vec!["Call Date", "Call Number", "Amount"],
                    vec!["01/15/2020", "1", "$2,500,000"],
                    vec!["04/15/2020", "2", "n/a"],
                ]),
                RawTable::from_rows(vec![vec!["Distribution Date", "Amount"]]),
                RawTable::from_rows(vec![vec!["Name", "Vintage"], vec!["Fund II", "2019"]]),
            ],
            vec![
                TextBlock::new(1, "Quarterly letter. Capital deployment continued."),
                TextBlock::new(2, "Outlook remains stable."),
            ],
        )
    }

    #[test]
    fn test_process_builds_summary() {
        let processor = DocumentProcessor::new(&PipelineConfig::default()).unwrap();
        let processed = processor.process(&extraction(), 5, 50).unwrap();

        let summary = &processed.summary;
        assert_eq!(summary.status, ProcessingStatus::Completed);
        assert_eq!(summary.pages_processed, 2);
        assert_eq!(summary.tables_found, 3);
        assert_eq!(summary.capital_calls, 1);
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(summary.ignored_tables, vec![1]);
        assert_eq!(summary.unknown_tables, vec![2]);
        assert_eq!(summary.tables_missing_amount, vec![2]);
        assert_eq!(summary.text_chunks, 1);

        assert_eq!(processed.records.len(), 1);
        assert_eq!(processed.records[0].amount, Decimal::from(2_500_000));
        assert_eq!(processed.chunks[0].page, Some(1));
    }

    #[test]
    fn test_empty_document_is_unsupported() {
        let processor = DocumentProcessor::new(&PipelineConfig::default()).unwrap();
        let err = processor
            .process(&ExtractionResult::default(), 1, 99)
            .unwrap_err();
        assert!(matches!(
            err,
            IngestError::UnsupportedDocument { document_id: 99, .. }
        ));
    }

    #[tokio::test]
    async fn test_ingest_commits_records_to_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut pipeline =
            DocumentIngestionPipeline::new(&PipelineConfig::default(), ledger.clone()).unwrap();

        let processed = pipeline.ingest(&extraction(), 5, 50).await.unwrap();
        assert_eq!(processed.summary.chunks_indexed, 0);

        let stored = ledger.fetch_transactions(5).unwrap();
        assert_eq!(stored, processed.records);

        // Re-ingesting the same document replaces its batch
        pipeline.ingest(&extraction(), 5, 50).await.unwrap();
        assert_eq!(ledger.fetch_transactions(5).unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore] // Requires Qdrant running and downloads the embedding model
    async fn test_ingest_with_vector_store() {
        let ledger = Arc::new(InMemoryLedger::new());
        let mut pipeline = DocumentIngestionPipeline::with_vector_store(
            &PipelineConfig::default(),
            ledger,
            "http://localhost:6334",
            "test_fund_chunks".to_string(),
        )
        .await
        .unwrap();

        let processed = pipeline.ingest(&extraction(), 5, 50).await.unwrap();
        assert_eq!(processed.summary.chunks_indexed, processed.chunks.len());
    }
}
