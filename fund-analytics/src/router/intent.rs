use fund_core::{KeywordSet, MetricKind, QueryIntent};
use serde::{Deserialize, Serialize};

/// Phrase lists driving intent and metric detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentKeywords {
    pub calculation: KeywordSet,
    pub definition: KeywordSet,
    pub retrieval: KeywordSet,
    pub pic: KeywordSet,
    pub dpi: KeywordSet,
    pub irr: KeywordSet,
}

impl Default for IntentKeywords {
    fn default() -> Self {
        Self {
            calculation: KeywordSet::new([
                "calculate",
                "compute",
                "what is the",
                "what's the",
                "current",
                "how much",
            ]),
            definition: KeywordSet::new([
                "what does",
                "mean",
                "means",
                "meaning",
                "define",
                "definition",
                "explain",
            ]),
            retrieval: KeywordSet::new(["show me", "list", "all", "display", "find"]),
            pic: KeywordSet::new(["pic", "paid-in capital", "paid in capital", "contributed capital"]),
            dpi: KeywordSet::new(["dpi", "distributions to paid-in", "distributions to paid in"]),
            irr: KeywordSet::new(["irr", "internal rate of return"]),
        }
    }
}

impl IntentKeywords {
    /// Sets in tie-break order: calculation questions outrank definitions, which outrank listings
    fn by_priority(&self) -> [(QueryIntent, &KeywordSet); 3] {
        [
            (QueryIntent::Calculation, &self.calculation),
            (QueryIntent::Definition, &self.definition),
            (QueryIntent::Retrieval, &self.retrieval),
        ]
    }

    /// DPI is checked before PIC so "distributions to paid-in capital" names DPI
    fn metrics(&self) -> [(MetricKind, &KeywordSet); 3] {
        [
            (MetricKind::Dpi, &self.dpi),
            (MetricKind::Irr, &self.irr),
            (MetricKind::Pic, &self.pic),
        ]
    }
}

pub fn classify_intent(query: &str, keywords: &IntentKeywords) -> QueryIntent {
    let text = query.to_lowercase();

    for (intent, set) in keywords.by_priority() {
        if let Some(phrase) = set.first_phrase_match(&text) {
            tracing::debug!("Query intent {:?} (matched {:?})", intent, phrase);
            return intent;
        }
    }

    QueryIntent::Unknown
}

/// Metric the question names, if any
pub fn detect_focus_metric(query: &str, keywords: &IntentKeywords) -> Option<MetricKind> {
    let text = query.to_lowercase();
    keywords
        .metrics()
        .into_iter()
        .find(|(_, set)| set.first_phrase_match(&text).is_some())
        .map(|(metric, _)| metric)
}
