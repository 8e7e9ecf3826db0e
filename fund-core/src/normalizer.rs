//! Field normalization for extracted table cells.
//!
//! PDF tables print dates and amounts in whatever house style the administrator uses. These
//! helpers turn a cell into a typed value or report that it cannot be read; they never guess.

use crate::error::AmountParseError;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Which reading wins for ambiguous numeric dates such as `03/04/2024`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateLocale {
    /// US style, `MM/DD/YYYY`
    #[default]
    MonthFirst,
    /// European style, `DD/MM/YYYY`
    DayFirst,
}

// Four-digit-year formats happily read "24" as year 24; anything outside this window is a
// misparse of a two-digit year and falls through to the `%y` formats.
const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2199;

/// Ordered format list for a locale. First successful parse wins.
fn date_formats(locale: DateLocale) -> [&'static str; 16] {
    let (slash, slash_alt, dash, dash_alt, short, short_alt) = match locale {
        DateLocale::MonthFirst => (
            "%m/%d/%Y", "%d/%m/%Y", "%m-%d-%Y", "%d-%m-%Y", "%m/%d/%y", "%d/%m/%y",
        ),
        DateLocale::DayFirst => (
            "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%m-%d-%Y", "%d/%m/%y", "%m/%d/%y",
        ),
    };

    [
        "%Y-%m-%d",
        slash,
        slash_alt,
        "%Y/%m/%d",
        dash,
        dash_alt,
        "%d.%m.%Y",
        "%b %d, %Y",
        "%B %d, %Y",
        "%b %d %Y",
        "%d %b %Y",
        "%d %B %Y",
        "%d-%b-%Y",
        "%d-%b-%y",
        short,
        short_alt,
    ]
}

/// Parse a date cell. Returns `None` when no supported format matches.
pub fn parse_date(text: &str, locale: DateLocale) -> Option<NaiveDate> {
    let normalized = normalize_date_text(text);
    if normalized.is_empty() {
        return None;
    }

    date_formats(locale).iter().find_map(|format| {
        NaiveDate::parse_from_str(&normalized, format)
            .ok()
            .filter(|date| (MIN_YEAR..=MAX_YEAR).contains(&date.year()))
    })
}

/// Collapse whitespace and drop abbreviation dots ("Mar. 15" / "Sept 15" → "Mar 15" / "Sep 15")
fn normalize_date_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let undotted = collapsed.replace(". ", " ");

    undotted
        .split(' ')
        .map(|word| match word.to_ascii_lowercase().as_str() {
            "sept" | "sept." => "Sep",
            "sept," => "Sep,",
            _ => word,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse a monetary cell into a signed decimal.
///
/// Negative markers: parentheses, a leading or trailing minus sign, a trailing `DR`.
/// A trailing `CR` is accepted as an explicit credit and leaves the sign positive.
pub fn parse_amount(text: &str) -> Result<Decimal, AmountParseError> {
    let mut body = text.trim();
    let mut negative = false;

    if let Some(stripped) = strip_ledger_suffix(body, "DR") {
        negative = true;
        body = stripped;
    } else if let Some(stripped) = strip_ledger_suffix(body, "CR") {
        body = stripped;
    }

    if body.contains('(') && body.contains(')') {
        negative = true;
    }

    let mut digits = String::with_capacity(body.len());
    let mut minus_inside_number = false;
    for c in body.chars() {
        match c {
            '0'..='9' | '.' => digits.push(c),
            '-' | '\u{2212}' | '\u{2013}' => {
                if digits.chars().any(|d| d.is_ascii_digit()) && has_digit_after(body, c) {
                    minus_inside_number = true;
                }
                negative = true;
            }
            _ => {}
        }
    }

    if !digits.chars().any(|c| c.is_ascii_digit()) {
        return Err(AmountParseError::NoDigits(text.to_string()));
    }
    if minus_inside_number {
        return Err(AmountParseError::Malformed(text.to_string()));
    }

    let value =
        Decimal::from_str(&digits).map_err(|_| AmountParseError::Malformed(text.to_string()))?;

    Ok(if negative { -value } else { value })
}

/// Strip a trailing ledger mark ("DR"/"CR") that is not part of a longer word
fn strip_ledger_suffix<'a>(text: &'a str, mark: &str) -> Option<&'a str> {
    let trimmed = text.trim_end_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.len() < mark.len() || !trimmed.is_char_boundary(trimmed.len() - mark.len()) {
        return None;
    }
    let (head, tail) = trimmed.split_at(trimmed.len() - mark.len());
    if !tail.eq_ignore_ascii_case(mark) {
        return None;
    }
    match head.chars().next_back() {
        Some(c) if c.is_alphabetic() => None,
        _ => Some(head.trim_end()),
    }
}

/// Whether a digit follows the first occurrence of `marker` in `text`
fn has_digit_after(text: &str, marker: char) -> bool {
    text.split_once(marker)
        .map(|(_, rest)| rest.chars().any(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}
