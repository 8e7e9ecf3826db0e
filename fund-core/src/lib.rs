pub mod config;
pub mod error;
pub mod keywords;
pub mod ledger;
pub mod normalizer;
pub mod types;

// Re-export common types
pub use config::{PipelineConfig, SegmenterConfig, TableKeywords};
pub use error::{
    AmountParseError, ConfigError, IngestError, LedgerError, MetricOverflow, SegmentError,
};
pub use keywords::KeywordSet;
pub use ledger::{InMemoryLedger, TransactionLedger};
pub use normalizer::{parse_amount, parse_date, DateLocale};
pub use types::*;
