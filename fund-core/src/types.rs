pub mod chunk;
pub mod metrics;
pub mod query;
pub mod raw_table;
pub mod transaction;

// Re-export common types
pub use chunk::{ScoredChunk, TextChunk};
pub use metrics::{Dpi, IrrOutcome, MetricKind, MetricsSnapshot};
pub use query::{ContextBundle, ConversationTurn, QueryIntent};
pub use raw_table::RawTable;
pub use transaction::{TransactionCategory, TransactionRecord};

/// Fund identifier, as assigned by the fund registry
pub type FundId = i64;

/// Document identifier, unique across funds
pub type DocumentId = i64;
