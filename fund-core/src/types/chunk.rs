use crate::types::{DocumentId, FundId};
use serde::{Deserialize, Serialize};

/// A retrieval-sized slice of document prose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub content: String,
    pub document_id: DocumentId,
    pub fund_id: FundId,
    pub sequence_index: usize,
    pub overlap_with_previous: bool,

    /// Number of leading characters of `content` copied from the previous chunk
    #[serde(default)]
    pub overlap_len: usize,

    /// Page the chunk's own (non-overlap) text starts on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

impl TextChunk {
    /// The part of `content` that is not repeated from the previous chunk
    pub fn body(&self) -> &str {
        match self.content.char_indices().nth(self.overlap_len) {
            Some((offset, _)) => &self.content[offset..],
            None => "",
        }
    }

    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A chunk returned by similarity search, with its score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}
