//! Keyword sets used for table classification and question routing.
//!
//! A set is plain data (lowercased phrases) so deployments can retune it from config; the
//! scoring functions live with the callers.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// Build a set; phrases are trimmed, lowercased and deduplicated (first occurrence wins)
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut phrases: Vec<String> = Vec::new();
        for keyword in keywords {
            let phrase = keyword.as_ref().trim().to_lowercase();
            if !phrase.is_empty() && !phrases.contains(&phrase) {
                phrases.push(phrase);
            }
        }
        Self(phrases)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of distinct phrases occurring anywhere in `text` (substring match).
    ///
    /// `text` must already be lowercase.
    pub fn distinct_hits(&self, text: &str) -> usize {
        self.iter().filter(|phrase| text.contains(phrase)).count()
    }

    /// First phrase (in set order) that occurs in `text` as whole words.
    ///
    /// `text` must already be lowercase.
    pub fn first_phrase_match(&self, text: &str) -> Option<&str> {
        self.iter().find(|phrase| contains_phrase(text, phrase))
    }

    /// Whether any phrase occurs as a substring of `text` (lowercase)
    pub fn any_substring(&self, text: &str) -> bool {
        self.iter().any(|phrase| text.contains(phrase))
    }
}

impl<'de> Deserialize<'de> for KeywordSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let phrases: Vec<String> = Vec::deserialize(deserializer)?;
        Ok(KeywordSet::new(phrases))
    }
}

/// Phrase occurrence bounded by non-alphanumeric characters on both sides
fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, matched)| {
        let end = start + matched.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        let after_ok = text[end..]
            .chars()
            .next()
            .map(|c| !c.is_alphanumeric())
            .unwrap_or(true);
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_and_dedups() {
        let set = KeywordSet::new(["Capital Call", " capital call ", "", "Drawdown"]);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["capital call", "drawdown"]);
    }

    #[test]
    fn test_distinct_hits_counts_each_phrase_once() {
        let set = KeywordSet::new(["distribution", "return of capital", "dividend"]);
        let text = "distribution date distribution amount return of capital";
        assert_eq!(set.distinct_hits(text), 2);
    }

    #[test]
    fn test_phrase_match_respects_word_boundaries() {
        let set = KeywordSet::new(["all", "list"]);
        assert_eq!(set.first_phrase_match("show capital calls"), None);
        assert_eq!(set.first_phrase_match("show me all calls"), Some("all"));
        assert_eq!(set.first_phrase_match("list: calls"), Some("list"));
    }

    #[test]
    fn test_deserialize_normalizes() {
        let set: KeywordSet = serde_json::from_str(r#"["Define", "define", "MEAN"]"#).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.first_phrase_match("what does it mean?"), Some("mean"));
    }
}
