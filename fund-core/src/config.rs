use crate::error::{ConfigError, SegmentError};
use crate::keywords::KeywordSet;
use crate::normalizer::DateLocale;
use crate::types::TransactionCategory;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Chunking parameters for narrative text (sizes in characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Maximum characters per chunk, overlap included
    pub chunk_size: usize,

    /// Characters carried over from the end of the previous chunk
    pub overlap: usize,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl SegmenterConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SegmentError> {
        let config = Self {
            chunk_size,
            overlap,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.chunk_size == 0 {
            return Err(SegmentError::ZeroChunkSize);
        }
        if self.overlap >= self.chunk_size {
            return Err(SegmentError::OverlapTooLarge {
                overlap: self.overlap,
                chunk_size: self.chunk_size,
            });
        }
        Ok(())
    }
}

/// Header keywords that identify each kind of transaction table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableKeywords {
    pub capital_call: KeywordSet,
    pub distribution: KeywordSet,
    pub adjustment: KeywordSet,
}

impl Default for TableKeywords {
    fn default() -> Self {
        Self {
            capital_call: KeywordSet::new([
                "capital call",
                "capital contribution",
                "contribution",
                "drawdown",
                "call date",
                "call number",
            ]),
            distribution: KeywordSet::new([
                "distribution",
                "return of capital",
                "dividend",
                "distribution date",
                "payment",
            ]),
            adjustment: KeywordSet::new([
                "adjustment",
                "rebalance",
                "recall",
                "correction",
                "amendment",
            ]),
        }
    }
}

impl TableKeywords {
    pub fn for_category(&self, category: TransactionCategory) -> Option<&KeywordSet> {
        match category {
            TransactionCategory::CapitalCall => Some(&self.capital_call),
            TransactionCategory::Distribution => Some(&self.distribution),
            TransactionCategory::Adjustment => Some(&self.adjustment),
            TransactionCategory::Unknown => None,
        }
    }

    /// Categories a table can be classified into, with their keywords
    pub fn categories(&self) -> [(TransactionCategory, &KeywordSet); 3] {
        [
            (TransactionCategory::CapitalCall, &self.capital_call),
            (TransactionCategory::Distribution, &self.distribution),
            (TransactionCategory::Adjustment, &self.adjustment),
        ]
    }
}

/// Tunables for document ingestion. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmenter: SegmenterConfig,
    pub table_keywords: TableKeywords,
    pub date_locale: DateLocale,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.segmenter.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = PipelineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.segmenter.chunk_size, 1000);
        assert_eq!(config.segmenter.overlap, 200);
        assert_eq!(config.date_locale, DateLocale::MonthFirst);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "segmenter": { "chunk_size": 500 },
            "table_keywords": { "adjustment": ["True-Up"] },
            "date_locale": "day_first"
        }"#;
        let config = PipelineConfig::from_json_str(json).unwrap();

        assert_eq!(config.segmenter.chunk_size, 500);
        assert_eq!(config.segmenter.overlap, 200);
        assert_eq!(config.date_locale, DateLocale::DayFirst);
        assert_eq!(
            config.table_keywords.adjustment.iter().collect::<Vec<_>>(),
            vec!["true-up"]
        );
        assert_eq!(config.table_keywords.capital_call.len(), 6);
    }

    #[test]
    fn test_invalid_segmenter_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"segmenter": {"chunk_size": 100, "overlap": 100}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(SegmentError::OverlapTooLarge { .. })
        ));

        assert_eq!(SegmenterConfig::new(0, 0), Err(SegmentError::ZeroChunkSize));
        assert!(SegmenterConfig::new(10, 9).is_ok());
    }

    #[test]
    fn test_missing_file() {
        let err = PipelineConfig::from_json_file("/nonexistent/pipeline.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
