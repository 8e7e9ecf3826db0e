//! Splits document prose into overlapping retrieval chunks.
//!
//! Text is consumed as contiguous units (paragraphs, falling back to sentences, then words).
//! Units are packed into a chunk until the next one would push it past `chunk_size`; the chunk
//! is then closed and the next one starts with the tail of the closed chunk as overlap. Every
//! unit keeps its trailing whitespace, so the non-overlap bodies of all chunks concatenate back
//! to the input exactly.

use super::extraction::TextBlock;
use fund_core::{DocumentId, FundId, SegmentError, SegmenterConfig, TextChunk};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing;

static PAGE_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bpage[ \t]+\d+(?:[ \t]+of[ \t]+\d+)?\b").expect("page marker pattern")
});
static HORIZONTAL_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+").expect("horizontal space pattern"));
static EXCESS_NEWLINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("newline run pattern"));

/// Normalize extracted page text before chunking.
///
/// Drops "Page N" / "Page N of M" markers, collapses runs of spaces and tabs, trims line ends
/// and squeezes three or more newlines into a single blank line.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = PAGE_MARKER.replace_all(&text, "");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = text
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");
    EXCESS_NEWLINES
        .replace_all(&text, "\n\n")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Paragraph,
    Sentence,
    Word,
}

impl Level {
    fn finer(self) -> Option<Level> {
        match self {
            Level::Paragraph => Some(Level::Sentence),
            Level::Sentence => Some(Level::Word),
            Level::Word => None,
        }
    }

    /// Whether a unit ends after this whitespace run
    fn cuts_after(self, run: &str, last_char: char) -> bool {
        match self {
            Level::Paragraph => run.matches('\n').count() >= 2,
            Level::Sentence => matches!(last_char, '.' | '!' | '?'),
            Level::Word => true,
        }
    }

    /// Byte ranges of this level's units inside `text[start..end]`.
    ///
    /// A unit runs up to (and including) the whitespace that ends it. Leading whitespace
    /// stays with the first unit.
    fn spans(self, text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
        let slice = &text[start..end];
        let mut spans = Vec::new();
        let mut unit_start = 0;
        let mut run_start: Option<usize> = None;
        let mut last_char: Option<char> = None;

        for (idx, c) in slice.char_indices() {
            if c.is_whitespace() {
                run_start.get_or_insert(idx);
                continue;
            }
            if let (Some(run), Some(prev)) = (run_start.take(), last_char) {
                if self.cuts_after(&slice[run..idx], prev) {
                    spans.push((start + unit_start, start + idx));
                    unit_start = idx;
                }
            }
            last_char = Some(c);
        }

        if unit_start < slice.len() {
            spans.push((start + unit_start, end));
        }
        spans
    }
}

/// A closed chunk before ids are attached
#[derive(Debug)]
struct Piece {
    content: String,
    overlap_len: usize,
    body_start: usize,
}

/// Packs units into chunks; see the module docs
struct Accumulator<'a> {
    text: &'a str,
    chunk_size: usize,
    overlap: usize,
    prefix: String,
    prefix_len: usize,
    body_start: usize,
    body_end: usize,
    body_len: usize,
    pieces: Vec<Piece>,
}

impl<'a> Accumulator<'a> {
    fn new(text: &'a str, config: &SegmenterConfig) -> Self {
        Self {
            text,
            chunk_size: config.chunk_size,
            overlap: config.overlap,
            prefix: String::new(),
            prefix_len: 0,
            body_start: 0,
            body_end: 0,
            body_len: 0,
            pieces: Vec::new(),
        }
    }

    fn fits(&self, unit_len: usize) -> bool {
        self.prefix_len + self.body_len + unit_len <= self.chunk_size
    }

    fn append(&mut self, start: usize, end: usize, unit_len: usize) {
        if self.body_len == 0 {
            self.body_start = start;
        }
        self.body_end = end;
        self.body_len += unit_len;
    }

    fn place(&mut self, start: usize, end: usize, level: Level) {
        let unit_len = self.text[start..end].chars().count();

        if self.fits(unit_len) {
            self.append(start, end, unit_len);
            return;
        }

        if self.body_len > 0 {
            self.close();
            if self.fits(unit_len) {
                self.append(start, end, unit_len);
                return;
            }
        }

        match level.finer() {
            Some(finer) => {
                for (unit_start, unit_end) in finer.spans(self.text, start, end) {
                    self.place(unit_start, unit_end, finer);
                }
            }
            None => self.place_word(start, end),
        }
    }

    /// Whitespace around a word may fall in either chunk, so only the word itself must fit
    fn place_word(&mut self, start: usize, end: usize) {
        let unit = &self.text[start..end];
        let word_start = start + (unit.len() - unit.trim_start().len());
        let word_end = start + unit.trim_end().len();
        if word_start >= word_end {
            self.place_space(start, end);
            return;
        }

        self.place_space(start, word_start);

        let word_len = self.text[word_start..word_end].chars().count();
        if !self.fits(word_len) {
            self.close();
        }
        if !self.fits(word_len) {
            // Shrink the overlap, dropping it entirely for words longer than a chunk
            let keep = self.chunk_size.saturating_sub(word_len);
            self.prefix = tail_chars(&self.prefix, keep).to_string();
            self.prefix_len = self.prefix.chars().count();
        }
        self.append(word_start, word_end, word_len);

        self.place_space(word_end, end);
    }

    /// Append a whitespace run, closing chunks as they fill
    fn place_space(&mut self, start: usize, end: usize) {
        let mut cursor = start;
        while cursor < end {
            let room = self
                .chunk_size
                .saturating_sub(self.prefix_len + self.body_len);
            if room == 0 {
                if self.body_len > 0 {
                    self.close();
                } else {
                    self.prefix.clear();
                    self.prefix_len = 0;
                }
                continue;
            }

            let rest = &self.text[cursor..end];
            let take = rest
                .char_indices()
                .nth(room)
                .map(|(idx, _)| idx)
                .unwrap_or(rest.len());
            let taken = rest[..take].chars().count();
            self.append(cursor, cursor + take, taken);
            cursor += take;
        }
    }

    fn close(&mut self) {
        if self.body_len == 0 {
            return;
        }

        let mut content = std::mem::take(&mut self.prefix);
        content.push_str(&self.text[self.body_start..self.body_end]);

        let next_prefix = overlap_tail(&content, self.overlap).to_string();

        self.pieces.push(Piece {
            content,
            overlap_len: self.prefix_len,
            body_start: self.body_start,
        });

        self.prefix_len = next_prefix.chars().count();
        self.prefix = next_prefix;
        self.body_len = 0;
    }

    fn finish(mut self) -> Vec<Piece> {
        self.close();
        self.pieces
    }
}

/// Last `n` characters of `s`
fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let cut = s
        .char_indices()
        .nth(count - n)
        .map(|(idx, _)| idx)
        .unwrap_or(s.len());
    &s[cut..]
}

/// Overlap carried into the next chunk: the last `overlap` characters of `content`, starting
/// after the last sentence end inside that window when there is one.
///
/// A sentence end is `.`, `!` or `?` followed by any whitespace.
fn overlap_tail(content: &str, overlap: usize) -> &str {
    if overlap == 0 {
        return "";
    }

    let window = tail_chars(content, overlap);
    let searchable = window.trim_end();
    let boundary = searchable
        .char_indices()
        .zip(searchable.chars().skip(1))
        .filter(|((_, c), next)| matches!(c, '.' | '!' | '?') && next.is_whitespace())
        .map(|((idx, c), _)| idx + c.len_utf8())
        .last();

    match boundary {
        Some(end) => window[end..].trim_start(),
        None => window,
    }
}

/// Chunker for narrative document text
#[derive(Debug, Clone, Copy)]
pub struct TextSegmenter {
    config: SegmenterConfig,
}

impl TextSegmenter {
    pub fn new(config: SegmenterConfig) -> Result<Self, SegmentError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    /// Split `text` into chunks. Blank input yields no chunks.
    pub fn segment(&self, text: &str, fund_id: FundId, document_id: DocumentId) -> Vec<TextChunk> {
        self.pieces(text)
            .into_iter()
            .enumerate()
            .map(|(idx, piece)| to_chunk(piece, idx, fund_id, document_id, None))
            .collect()
    }

    /// Clean and join a document's page blocks (blank line between pages), then split.
    ///
    /// Each chunk is tagged with the page on which its own (non-overlap) text starts.
    pub fn segment_document(
        &self,
        blocks: &[TextBlock],
        fund_id: FundId,
        document_id: DocumentId,
    ) -> Vec<TextChunk> {
        let mut text = String::new();
        let mut page_starts: Vec<(usize, u32)> = Vec::new();

        for block in blocks {
            let cleaned = clean_text(&block.text);
            if cleaned.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            page_starts.push((text.len(), block.page));
            text.push_str(&cleaned);
        }

        let chunks: Vec<TextChunk> = self
            .pieces(&text)
            .into_iter()
            .enumerate()
            .map(|(idx, piece)| {
                let page = page_starts
                    .iter()
                    .take_while(|(offset, _)| *offset <= piece.body_start)
                    .last()
                    .map(|(_, page)| *page);
                to_chunk(piece, idx, fund_id, document_id, page)
            })
            .collect();

        tracing::debug!(
            "Segmented document {} ({} pages, {} chars) into {} chunks",
            document_id,
            page_starts.len(),
            text.chars().count(),
            chunks.len()
        );

        chunks
    }

    fn pieces(&self, text: &str) -> Vec<Piece> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let mut acc = Accumulator::new(text, &self.config);
        for (start, end) in Level::Paragraph.spans(text, 0, text.len()) {
            acc.place(start, end, Level::Paragraph);
        }
        acc.finish()
    }
}

fn to_chunk(
    piece: Piece,
    sequence_index: usize,
    fund_id: FundId,
    document_id: DocumentId,
    page: Option<u32>,
) -> TextChunk {
    TextChunk {
        content: piece.content,
        document_id,
        fund_id,
        sequence_index,
        overlap_with_previous: sequence_index > 0,
        overlap_len: piece.overlap_len,
        page,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segmenter(chunk_size: usize, overlap: usize) -> TextSegmenter {
        TextSegmenter::new(SegmenterConfig::new(chunk_size, overlap).unwrap()).unwrap()
    }

    fn bodies(chunks: &[TextChunk]) -> String {
        chunks.iter().map(|c| c.body()).collect()
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = segmenter(1000, 200).segment("Fund III closed in 2020.", 1, 2);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Fund III closed in 2020.");
        assert!(!chunks[0].overlap_with_previous);
        assert_eq!(chunks[0].overlap_len, 0);
        assert_eq!((chunks[0].fund_id, chunks[0].document_id), (1, 2));
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(segmenter(100, 10).segment("  \n\n ", 1, 1).is_empty());
        assert!(segmenter(100, 10).segment("", 1, 1).is_empty());
    }

    #[test]
    fn test_paragraph_split_with_sentence_overlap() {
        let text = "First paragraph talks about calls. It has two sentences.\n\nSecond paragraph is about distributions.";
        let chunks = segmenter(70, 30).segment(text, 1, 1);

        assert_eq!(chunks.len(), 2);
        assert_eq!(
            chunks[0].content,
            "First paragraph talks about calls. It has two sentences.\n\n"
        );
        // window is "It has two sentences.\n\n" plus 7 chars before it, cut after ". "
        assert_eq!(chunks[1].overlap_len, 23);
        assert!(chunks[1].content.starts_with("It has two sentences.\n\nSecond"));
        assert!(chunks[1].overlap_with_previous);
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_long_paragraph_falls_back_to_sentences_and_words() {
        let sentence = "The general partner called capital from limited partners. ";
        let paragraph = sentence.repeat(12);
        let text = format!("{}\n\n{}", paragraph.trim_end(), "Tail.");

        let chunks = segmenter(150, 40).segment(&text, 1, 1);
        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 150, "chunk too long: {}", chunk.char_len());
        }
        assert_eq!(bodies(&chunks), text);
        assert_eq!(
            chunks.iter().map(|c| c.sequence_index).collect::<Vec<_>>(),
            (0..chunks.len()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_word_fallback_respects_size() {
        let text = "word ".repeat(100);
        let chunks = segmenter(32, 8).segment(&text, 1, 1);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 32);
        }
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_oversized_word_kept_whole() {
        let long_word = "x".repeat(50);
        let text = format!("alpha beta {} gamma", long_word);
        let chunks = segmenter(20, 5).segment(&text, 1, 1);

        let oversized: Vec<&TextChunk> = chunks.iter().filter(|c| c.char_len() > 20).collect();
        assert_eq!(oversized.len(), 1);
        assert_eq!(oversized[0].overlap_len, 0);
        assert!(oversized[0].content.starts_with(&long_word));
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_word_of_exactly_chunk_size() {
        let word = "x".repeat(1000);
        let text = format!("Intro sentence. {} tail words here.", word);
        let chunks = segmenter(1000, 200).segment(&text, 1, 1);

        for chunk in &chunks {
            assert!(chunk.char_len() <= 1000, "chunk too long: {}", chunk.char_len());
        }
        assert!(chunks.iter().any(|c| c.content == word));
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_whitespace_never_pushes_chunk_past_size() {
        let texts = [
            "Short. Short. Short. Short. Short. Short.",
            "  Leading space. Then more words follow here.\n\nNext para.",
            "Tabs\tand  double  spaces.\nLine two! Line three? Done.",
        ];
        for text in texts {
            let longest = text
                .split_whitespace()
                .map(|w| w.chars().count())
                .max()
                .unwrap_or(1);
            for chunk_size in longest.max(2)..40 {
                for overlap in 0..chunk_size {
                    let chunks = segmenter(chunk_size, overlap).segment(text, 1, 1);
                    for chunk in &chunks {
                        assert!(
                            chunk.char_len() <= chunk_size,
                            "{:?} split at {}/{} gave {:?}",
                            text,
                            chunk_size,
                            overlap,
                            chunk.content
                        );
                    }
                    assert_eq!(bodies(&chunks), text);
                }
            }
        }
    }

    #[test]
    fn test_overlap_starts_after_any_sentence_whitespace() {
        assert_eq!(
            overlap_tail("Calls were made.\nDistributions followed", 30),
            "Distributions followed"
        );
        assert_eq!(overlap_tail("Was it paid?  Yes it was", 15), "Yes it was");
        assert_eq!(overlap_tail("no sentence end here at all", 8), "e at all");
        assert_eq!(overlap_tail("anything", 0), "");
    }

    #[test]
    fn test_zero_overlap() {
        let text = "one two three four five six seven eight nine ten";
        let chunks = segmenter(12, 0).segment(text, 1, 1);
        assert!(chunks.iter().all(|c| c.overlap_len == 0));
        assert!(chunks.iter().skip(1).all(|c| c.overlap_with_previous));
        assert_eq!(chunks.iter().map(|c| c.content.as_str()).collect::<String>(), text);
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let text = "Überschüsse € ".repeat(20);
        let chunks = segmenter(40, 10).segment(&text, 1, 1);
        for chunk in &chunks {
            assert!(chunk.char_len() <= 40);
        }
        assert_eq!(bodies(&chunks), text);
    }

    #[test]
    fn test_invalid_config() {
        let bad = SegmenterConfig {
            chunk_size: 10,
            overlap: 10,
        };
        assert!(TextSegmenter::new(bad).is_err());
    }

    #[test]
    fn test_clean_text() {
        let raw = "Quarterly   Report\t2024  \r\nPage 3\n\n\n\nPerformance was strong.\nPage 4 of 12\n";
        assert_eq!(
            clean_text(raw),
            "Quarterly Report 2024\n\nPerformance was strong."
        );
        assert_eq!(clean_text("See homepage 3 for details"), "See homepage 3 for details");
    }

    #[test]
    fn test_segment_document_tags_pages() {
        let blocks = vec![
            TextBlock::new(1, "Page 1\nIntroduction to the fund."),
            TextBlock::new(2, "   "),
            TextBlock::new(3, "Capital was called in four tranches."),
        ];
        let chunks = segmenter(60, 10).segment_document(&blocks, 9, 90);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page, Some(1));
        assert_eq!(chunks[1].page, Some(3));
        assert_eq!(
            bodies(&chunks),
            "Introduction to the fund.\n\nCapital was called in four tranches."
        );
    }
}
