pub mod context;
pub mod intent;

pub use context::{QueryRouter, MAX_CONTEXT_CHUNKS, MAX_HISTORY_TURNS};
pub use intent::{classify_intent, detect_focus_metric, IntentKeywords};
