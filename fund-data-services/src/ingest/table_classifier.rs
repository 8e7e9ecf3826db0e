use fund_core::{
    parse_amount, parse_date, DateLocale, DocumentId, FundId, RawTable, TableKeywords,
    TransactionCategory, TransactionRecord,
};
use serde::Serialize;
use tracing;

/// Category decision for one table
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Classification {
    pub category: TransactionCategory,

    /// Winning score over the sum of all category scores; 0.0 for `Unknown`
    pub confidence: f64,
}

impl Classification {
    fn unknown() -> Self {
        Self {
            category: TransactionCategory::Unknown,
            confidence: 0.0,
        }
    }
}

/// Column positions inside a table's header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub date: Option<usize>,
    pub amount: usize,
    pub description: Option<usize>,
    pub recallable: Option<usize>,
}

/// Records produced from one table, plus what had to be left out
#[derive(Debug, Clone, PartialEq)]
pub struct TableExtraction {
    pub classification: Classification,
    pub records: Vec<TransactionRecord>,
    pub skipped_rows: usize,

    /// No column could be identified as the amount; `records` is empty
    pub missing_amount_column: bool,
}

const AMOUNT_HEADERS: [&str; 3] = ["amount", "value", "$"];
const DESCRIPTION_HEADERS: [&str; 3] = ["type", "description", "category"];
const RECALLABLE_YES: [&str; 4] = ["yes", "true", "y", "1"];

/// Amount column names to fall back on when the header has no generic amount column
fn category_amount_headers(category: TransactionCategory) -> &'static [&'static str] {
    match category {
        TransactionCategory::CapitalCall => &["call amount", "contribution", "drawdown"],
        TransactionCategory::Distribution => &["distribution", "payment"],
        TransactionCategory::Adjustment => &["adjustment"],
        TransactionCategory::Unknown => &[],
    }
}

/// Keyword-scored table classifier and row converter.
///
/// Pure: tables in, records out. Nothing here touches storage.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier {
    keywords: TableKeywords,
    date_locale: DateLocale,
}

impl TableClassifier {
    pub fn new(keywords: TableKeywords, date_locale: DateLocale) -> Self {
        Self {
            keywords,
            date_locale,
        }
    }

    /// Score the header plus first data row against every category's keywords
    pub fn classify(&self, table: &RawTable) -> Classification {
        let text = scoring_text(table);
        if text.trim().is_empty() {
            return Classification::unknown();
        }

        let scores: Vec<(TransactionCategory, usize)> = self
            .keywords
            .categories()
            .into_iter()
            .map(|(category, keywords)| (category, keywords.distinct_hits(&text)))
            .collect();

        let total: usize = scores.iter().map(|(_, score)| score).sum();
        let best = scores.iter().map(|(_, score)| *score).max().unwrap_or(0);
        if best == 0 {
            return Classification::unknown();
        }

        let mut leaders = scores.iter().filter(|(_, score)| *score == best);
        match (leaders.next(), leaders.next()) {
            (Some((category, _)), None) => Classification {
                category: *category,
                confidence: best as f64 / total as f64,
            },
            _ => {
                tracing::debug!("Tied table scores {:?}, classifying as unknown", scores);
                Classification::unknown()
            }
        }
    }

    /// Locate date, amount, description and recallable columns in a header row.
    ///
    /// Returns `None` when no amount column can be identified.
    pub fn detect_columns(header: &[String], category: TransactionCategory) -> Option<ColumnMap> {
        let lowered: Vec<String> = header.iter().map(|cell| cell.trim().to_lowercase()).collect();

        let date = find_column(&lowered, &["date"], &[]);
        let amount = find_column(&lowered, &AMOUNT_HEADERS, &[date])
            .or_else(|| find_column(&lowered, category_amount_headers(category), &[date]))?;
        let description = find_column(&lowered, &DESCRIPTION_HEADERS, &[date, Some(amount)]);
        let recallable = find_column(
            &lowered,
            &["recallable"],
            &[date, Some(amount), description],
        );

        Some(ColumnMap {
            date,
            amount,
            description,
            recallable,
        })
    }

    /// Classify a table and convert its data rows into records.
    ///
    /// Returns `None` for tables with fewer than two rows (nothing to convert).
    pub fn extract_records(
        &self,
        table: &RawTable,
        fund_id: FundId,
        document_id: DocumentId,
    ) -> Option<TableExtraction> {
        if table.len() < 2 {
            return None;
        }

        let classification = self.classify(table);
        let header = table.header().unwrap_or(&[]);

        let Some(columns) = Self::detect_columns(header, classification.category) else {
            tracing::warn!(
                "Table classified as {} has no amount column (header: {:?})",
                classification.category,
                header
            );
            return Some(TableExtraction {
                classification,
                records: Vec::new(),
                skipped_rows: 0,
                missing_amount_column: true,
            });
        };

        let mut records = Vec::new();
        let mut skipped_rows = 0;

        for (row_idx, row) in table.data_rows().iter().enumerate() {
            match self.convert_row(row, &columns, classification.category, fund_id, document_id) {
                Some(record) => records.push(record),
                None => {
                    tracing::debug!("Skipping row {} of {} table: {:?}", row_idx + 1, classification.category, row);
                    skipped_rows += 1;
                }
            }
        }

        tracing::debug!(
            "Table classified as {} (confidence {:.2}): {} records, {} skipped rows",
            classification.category,
            classification.confidence,
            records.len(),
            skipped_rows
        );

        Some(TableExtraction {
            classification,
            records,
            skipped_rows,
            missing_amount_column: false,
        })
    }

    fn convert_row(
        &self,
        row: &[String],
        columns: &ColumnMap,
        category: TransactionCategory,
        fund_id: FundId,
        document_id: DocumentId,
    ) -> Option<TransactionRecord> {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            return None;
        }

        let amount = match parse_amount(row.get(columns.amount)?) {
            Ok(amount) => amount,
            Err(e) => {
                tracing::warn!("Dropping row with unreadable amount: {}", e);
                return None;
            }
        };

        let date = columns
            .date
            .and_then(|idx| row.get(idx))
            .and_then(|cell| parse_date(cell, self.date_locale));

        let description = columns
            .description
            .and_then(|idx| row.get(idx))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .map(str::to_string);

        let recallable = columns
            .recallable
            .and_then(|idx| row.get(idx))
            .map(|cell| RECALLABLE_YES.contains(&cell.trim().to_lowercase().as_str()));

        let raw_text = row
            .iter()
            .map(|cell| cell.trim())
            .collect::<Vec<_>>()
            .join(" | ");

        Some(
            TransactionRecord::new(category, date, amount, raw_text, fund_id, document_id)
                .with_description(description)
                .with_recallable(recallable),
        )
    }
}

/// First column not already taken whose header contains any of `names`
fn find_column(headers: &[String], names: &[&str], taken: &[Option<usize>]) -> Option<usize> {
    headers.iter().enumerate().position(|(idx, header)| {
        !taken.contains(&Some(idx)) && names.iter().any(|name| header.contains(name))
    })
}

/// Lowercased header row followed by the first data row
fn scoring_text(table: &RawTable) -> String {
    table
        .rows
        .iter()
        .take(2)
        .map(|row| row.join(" "))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
