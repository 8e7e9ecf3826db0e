pub mod ingest;

// Re-export commonly used items
pub use ingest::{
    clean_text, DocumentIngestionPipeline, DocumentProcessor, ExtractionResult, LmdbLedger,
    ProcessedDocument, ProcessingStatus, ProcessingSummary, TableClassifier, TextBlock,
    TextSegmenter, VectorStore,
};
