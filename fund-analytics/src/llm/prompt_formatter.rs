use fund_core::{ContextBundle, MetricKind, MetricsSnapshot, QueryIntent, TransactionCategory};
use rust_decimal::Decimal;

const EXCERPT_CHARS: usize = 300;

/// Plain-language definitions used in prompts and fallback answers
pub fn definition(metric: MetricKind) -> &'static str {
    match metric {
        MetricKind::Pic => {
            "Paid-In Capital (PIC) is the cumulative capital contributed by limited partners \
             through capital calls, net of qualifying adjustments."
        }
        MetricKind::Dpi => {
            "Distributions to Paid-In capital (DPI) is total distributions returned to limited \
             partners divided by paid-in capital. A DPI of 1.0x means the fund has returned all \
             contributed capital."
        }
        MetricKind::Irr => {
            "Internal Rate of Return (IRR) is the annualized discount rate at which the net \
             present value of the fund's dated cash flows is zero."
        }
    }
}

/// Formatter for answer-generation prompts and the no-LLM fallback
pub struct FundPromptFormatter;

impl FundPromptFormatter {
    /// Prompt for the text generator, built only from the context bundle
    pub fn format_prompt(bundle: &ContextBundle) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("═══ FUND {} QUESTION ═══\n\n", bundle.fund_id));
        prompt.push_str(&format!("QUESTION: {}\n", bundle.query.trim()));
        prompt.push_str(&format!("INTENT: {}\n", intent_label(bundle.intent)));
        if let Some(metric) = bundle.focus_metric {
            prompt.push_str(&format!("FOCUS METRIC: {}\n", metric));
        }

        if bundle.intent == QueryIntent::Definition {
            prompt.push_str("\nGLOSSARY:\n");
            for metric in focus_or_all(bundle.focus_metric) {
                prompt.push_str(&format!("  {}\n", definition(metric)));
            }
        }

        if let Some(metrics) = &bundle.metrics {
            prompt.push_str("\nCOMPUTED METRICS (authoritative, do not recompute):\n");
            prompt.push_str(&metrics_block(metrics));
        }

        prompt.push_str("\nDOCUMENT EXCERPTS:\n");
        if bundle.chunks.is_empty() {
            prompt.push_str("  [No relevant passages found for this fund]\n");
        }
        for (i, scored) in bundle.chunks.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. Document {}{} (similarity {:.0}%)\n",
                i + 1,
                scored.chunk.document_id,
                scored
                    .chunk
                    .page
                    .map(|p| format!(", page {}", p))
                    .unwrap_or_default(),
                scored.score * 100.0
            ));
            prompt.push_str(&format!("   {}\n", scored.chunk.content.trim()));
        }

        if !bundle.history.is_empty() {
            prompt.push_str("\nRECENT CONVERSATION:\n");
            for turn in &bundle.history {
                prompt.push_str(&format!("  Q: {}\n  A: {}\n", turn.question, turn.answer));
            }
        }

        if !bundle.notes.is_empty() {
            prompt.push_str("\nNOTES:\n");
            for note in &bundle.notes {
                prompt.push_str(&format!("  - {}\n", note));
            }
        }

        prompt.push_str("\n═══════════════════════════════════════════════════════════\n");
        prompt.push_str("Answer the question using only the metrics and excerpts above.\n");
        prompt.push_str("Quote figures exactly as given. If the context does not contain the\n");
        prompt.push_str("answer, say so instead of guessing.\n");

        prompt
    }

    /// Deterministic answer from metrics, glossary and excerpts alone
    pub fn fallback_answer(bundle: &ContextBundle) -> String {
        match bundle.intent {
            QueryIntent::Calculation => match &bundle.metrics {
                Some(metrics) => match bundle.focus_metric {
                    Some(metric) => metric_sentence(metrics, metric),
                    None => format!("Current fund metrics:\n{}", metrics_block(metrics)),
                },
                None => {
                    let mut answer = "Fund metrics are not available right now.".to_string();
                    for note in &bundle.notes {
                        answer.push_str(&format!(" {}", note));
                    }
                    answer
                }
            },
            QueryIntent::Definition => focus_or_all(bundle.focus_metric)
                .into_iter()
                .map(definition)
                .collect::<Vec<_>>()
                .join("\n"),
            QueryIntent::Retrieval | QueryIntent::Unknown => excerpt_listing(bundle),
        }
    }
}

fn intent_label(intent: QueryIntent) -> &'static str {
    match intent {
        QueryIntent::Calculation => "calculation",
        QueryIntent::Definition => "definition",
        QueryIntent::Retrieval => "retrieval",
        QueryIntent::Unknown => "general",
    }
}

fn focus_or_all(focus: Option<MetricKind>) -> Vec<MetricKind> {
    match focus {
        Some(metric) => vec![metric],
        None => vec![MetricKind::Pic, MetricKind::Dpi, MetricKind::Irr],
    }
}

fn metrics_block(metrics: &MetricsSnapshot) -> String {
    let mut block = String::new();
    block.push_str(&format!("  Paid-In Capital (PIC): {}\n", format_amount(metrics.pic)));
    block.push_str(&format!(
        "  Total Distributions: {}\n",
        format_amount(metrics.total_distributions)
    ));
    if dpi_unavailable(metrics) {
        block.push_str("  DPI: could not be computed (see warnings)\n");
    } else {
        block.push_str(&format!("  DPI: {}\n", metrics.dpi));
    }
    block.push_str(&format!("  IRR: {}\n", metrics.irr));
    if !metrics.irr_excluded.is_empty() {
        block.push_str(&format!(
            "  Undated transactions excluded from IRR: {}\n",
            metrics.irr_excluded.len()
        ));
    }
    for anomaly in &metrics.anomalies {
        block.push_str(&format!("  Warning: {}\n", anomaly));
    }
    block
}

/// Undefined DPI despite called capital: the totals overflowed
fn dpi_unavailable(metrics: &MetricsSnapshot) -> bool {
    metrics.dpi.is_undefined() && !metrics.pic.is_zero()
}

fn metric_sentence(metrics: &MetricsSnapshot, metric: MetricKind) -> String {
    match metric {
        MetricKind::Pic => format!(
            "Paid-in capital is {} across {} contributing transactions.",
            format_amount(metrics.pic),
            metrics
                .breakdown
                .iter()
                .filter(|r| r.category != TransactionCategory::Distribution)
                .count()
        ),
        MetricKind::Dpi => match metrics.dpi.value() {
            Some(_) => format!(
                "DPI is {} ({} distributed on {} paid in).",
                metrics.dpi,
                format_amount(metrics.total_distributions),
                format_amount(metrics.pic)
            ),
            None if dpi_unavailable(metrics) => format!(
                "DPI could not be computed: {}.",
                metrics.anomalies.join("; ")
            ),
            None => "DPI is not yet applicable: no capital has been called.".to_string(),
        },
        MetricKind::Irr => match metrics.irr.rate() {
            Some(_) => format!("IRR is {}.", metrics.irr),
            None => format!("{}.", metrics.irr),
        },
    }
}

fn excerpt_listing(bundle: &ContextBundle) -> String {
    if bundle.chunks.is_empty() {
        return "No matching document passages were found for this fund.".to_string();
    }

    let mut answer = String::from("Relevant passages from the fund's documents:\n");
    for (i, scored) in bundle.chunks.iter().enumerate() {
        answer.push_str(&format!(
            "{}. {}\n",
            i + 1,
            excerpt(scored.chunk.content.trim(), EXCERPT_CHARS)
        ));
    }
    answer
}

fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `$1,234,567.89`
pub fn format_amount(amount: Decimal) -> String {
    let text = format!("{:.2}", amount.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fund_core::{ConversationTurn, Dpi, IrrOutcome, ScoredChunk, TextChunk};

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            fund_id: 1,
            pic: Decimal::from(10_000_000),
            total_distributions: Decimal::from(4_000_000),
            dpi: Dpi::Ratio(Decimal::new(4, 1)),
            irr: IrrOutcome::Converged {
                rate: Decimal::new(1239, 4),
                iterations: 4,
            },
            breakdown: vec![],
            irr_excluded: vec![],
            anomalies: vec![],
        }
    }

    fn bundle(intent: QueryIntent, focus: Option<MetricKind>) -> ContextBundle {
        ContextBundle {
            query: "Calculate the current DPI".to_string(),
            fund_id: 1,
            intent,
            focus_metric: focus,
            chunks: vec![ScoredChunk {
                chunk: TextChunk {
                    content: "The fund made two distributions in 2021.".to_string(),
                    document_id: 12,
                    fund_id: 1,
                    sequence_index: 0,
                    overlap_with_previous: false,
                    overlap_len: 0,
                    page: Some(3),
                },
                score: 0.82,
            }],
            metrics: None,
            history: vec![ConversationTurn::new("What is PIC?", "$10,000,000.00")],
            notes: vec![],
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(Decimal::from(10_000_000)), "$10,000,000.00");
        assert_eq!(format_amount(Decimal::new(-123456, 2)), "-$1,234.56");
        assert_eq!(format_amount(Decimal::from(999)), "$999.00");
        assert_eq!(format_amount(Decimal::ZERO), "$0.00");
    }

    #[test]
    fn test_calculation_prompt_includes_metrics_and_context() {
        let mut bundle = bundle(QueryIntent::Calculation, Some(MetricKind::Dpi));
        bundle.metrics = Some(snapshot());
        let prompt = FundPromptFormatter::format_prompt(&bundle);

        assert!(prompt.contains("FUND 1 QUESTION"));
        assert!(prompt.contains("FOCUS METRIC: DPI"));
        assert!(prompt.contains("COMPUTED METRICS"));
        assert!(prompt.contains("DPI: 0.40x"));
        assert!(prompt.contains("Document 12, page 3 (similarity 82%)"));
        assert!(prompt.contains("Q: What is PIC?"));
        assert!(!prompt.contains("GLOSSARY"));
    }

    #[test]
    fn test_definition_prompt_has_glossary_only_for_focus() {
        let prompt =
            FundPromptFormatter::format_prompt(&bundle(QueryIntent::Definition, Some(MetricKind::Irr)));
        assert!(prompt.contains("GLOSSARY"));
        assert!(prompt.contains("Internal Rate of Return"));
        assert!(!prompt.contains("Paid-In Capital (PIC) is"));
    }

    #[test]
    fn test_fallback_calculation_with_focus() {
        let mut bundle = bundle(QueryIntent::Calculation, Some(MetricKind::Dpi));
        bundle.metrics = Some(snapshot());
        let answer = FundPromptFormatter::fallback_answer(&bundle);
        assert_eq!(
            answer,
            "DPI is 0.40x ($4,000,000.00 distributed on $10,000,000.00 paid in)."
        );
    }

    #[test]
    fn test_fallback_dpi_not_applicable() {
        let mut metrics = snapshot();
        metrics.pic = Decimal::ZERO;
        metrics.dpi = Dpi::Undefined;
        let mut bundle = bundle(QueryIntent::Calculation, Some(MetricKind::Dpi));
        bundle.metrics = Some(metrics);
        assert!(FundPromptFormatter::fallback_answer(&bundle).contains("not yet applicable"));
    }

    #[test]
    fn test_fallback_dpi_out_of_range() {
        let mut metrics = snapshot();
        metrics.total_distributions = Decimal::MAX;
        metrics.dpi = Dpi::Undefined;
        metrics
            .anomalies
            .push("distribution total exceeds the decimal range".to_string());
        let mut bundle = bundle(QueryIntent::Calculation, Some(MetricKind::Dpi));
        bundle.metrics = Some(metrics);

        let answer = FundPromptFormatter::fallback_answer(&bundle);
        assert!(answer.starts_with("DPI could not be computed"));
        assert!(answer.contains("exceeds the decimal range"));
        assert!(FundPromptFormatter::format_prompt(&bundle).contains("DPI: could not be computed"));
    }

    #[test]
    fn test_fallback_without_metrics_repeats_notes() {
        let mut bundle = bundle(QueryIntent::Calculation, None);
        bundle.notes.push("Metrics could not be computed: disk gone".to_string());
        let answer = FundPromptFormatter::fallback_answer(&bundle);
        assert!(answer.starts_with("Fund metrics are not available"));
        assert!(answer.contains("disk gone"));
    }

    #[test]
    fn test_fallback_definition_and_listing() {
        let definition = FundPromptFormatter::fallback_answer(&bundle(QueryIntent::Definition, None));
        assert_eq!(definition.lines().count(), 3);

        let listing = FundPromptFormatter::fallback_answer(&bundle(QueryIntent::Retrieval, None));
        assert!(listing.contains("1. The fund made two distributions in 2021."));

        let mut empty = bundle(QueryIntent::Unknown, None);
        empty.chunks.clear();
        assert!(FundPromptFormatter::fallback_answer(&empty).starts_with("No matching"));
    }

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("héllo wörld", 5), "héllo...");
        assert_eq!(excerpt("short", 10), "short");
    }
}
