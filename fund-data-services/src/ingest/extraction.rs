use anyhow::{Context, Result};
use fund_core::RawTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Text of one PDF page as produced by the extractor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    /// 1-based page number
    pub page: u32,
    pub text: String,
}

impl TextBlock {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// Raw tables and page text pulled out of one document by the external PDF extractor.
///
/// JSON shape:
/// ```json
/// {
///   "tables": [[["Date", "Amount"], ["2024-01-15", "$1,000"]]],
///   "text_blocks": [{"page": 1, "text": "Quarterly report ..."}]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionResult {
    pub tables: Vec<RawTable>,
    pub text_blocks: Vec<TextBlock>,
}

impl ExtractionResult {
    pub fn new(tables: Vec<RawTable>, text_blocks: Vec<TextBlock>) -> Self {
        Self {
            tables,
            text_blocks,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse extraction result JSON")
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read extraction file {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Number of distinct pages that yielded text
    pub fn pages_with_text(&self) -> usize {
        let mut pages: Vec<u32> = self
            .text_blocks
            .iter()
            .filter(|block| !block.text.trim().is_empty())
            .map(|block| block.page)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages.len()
    }

    /// Whether there is anything to ingest (scanned PDFs come back empty)
    pub fn has_content(&self) -> bool {
        !self.tables.is_empty() || self.text_blocks.iter().any(|b| !b.text.trim().is_empty())
    }
}
