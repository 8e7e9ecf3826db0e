//! Error types shared by the ingestion and analytics crates

use crate::types::DocumentId;
use thiserror::Error;

/// A cell could not be read as a monetary amount. Callers drop the row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountParseError {
    #[error("no digits in amount text: {0:?}")]
    NoDigits(String),

    #[error("malformed amount text: {0:?}")]
    Malformed(String),
}

/// Invalid chunking parameters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SegmentError {
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    #[error("overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge { overlap: usize, chunk_size: usize },
}

/// A metric total or ratio fell outside the `Decimal` range
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricOverflow {
    #[error("paid-in capital total exceeds the decimal range")]
    PaidInCapital,

    #[error("distribution total exceeds the decimal range")]
    Distributions,

    #[error("DPI ratio exceeds the decimal range")]
    Dpi,
}

/// Transaction ledger failures (storage collaborator)
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Ledger storage error: {0}")]
    Storage(String),

    #[error("Ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ledger lock poisoned")]
    Poisoned,
}

/// Document-level ingestion failures. Row and table problems never surface here.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported document {document_id}: {reason}")]
    UnsupportedDocument {
        document_id: DocumentId,
        reason: String,
    },

    #[error("Invalid segmenter configuration: {0}")]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Pipeline configuration could not be loaded
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] SegmentError),
}
