pub mod extraction;
pub mod table_classifier;
pub mod text_segmenter;
pub mod vector_store;
pub mod ingestion_pipeline;
pub mod lmdb_ledger;

// Re-export commonly used items
pub use extraction::{ExtractionResult, TextBlock};
pub use table_classifier::{Classification, ColumnMap, TableClassifier, TableExtraction};
pub use text_segmenter::{clean_text, TextSegmenter};
pub use vector_store::{
    chunk_to_point, fund_filter, point_to_chunk, VectorStore, EMBEDDING_DIM, EMBEDDING_MODEL_NAME,
};
pub use ingestion_pipeline::{
    DocumentIngestionPipeline, DocumentProcessor, ProcessedDocument, ProcessingStatus,
    ProcessingSummary,
};
pub use lmdb_ledger::LmdbLedger;
