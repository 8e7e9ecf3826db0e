use crate::types::{DocumentId, FundId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction type a classified table row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionCategory {
    CapitalCall,
    Distribution,
    Adjustment,
    Unknown,
}

impl TransactionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionCategory::CapitalCall => "capital_call",
            TransactionCategory::Distribution => "distribution",
            TransactionCategory::Adjustment => "adjustment",
            TransactionCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TransactionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transaction extracted from one row of a classified table.
///
/// `amount` keeps the sign the document printed; [`TransactionRecord::cash_flow`] maps it
/// onto the LP-perspective sign convention used by IRR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub category: TransactionCategory,
    pub date: Option<NaiveDate>,
    pub amount: Decimal,
    pub raw_text: String,
    pub fund_id: FundId,
    pub document_id: DocumentId,

    /// Type/description column, when the table has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Recallable flag from distribution tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recallable: Option<bool>,
}

impl TransactionRecord {
    /// Create a record without the optional description/recallable columns
    pub fn new(
        category: TransactionCategory,
        date: Option<NaiveDate>,
        amount: Decimal,
        raw_text: String,
        fund_id: FundId,
        document_id: DocumentId,
    ) -> Self {
        Self {
            category,
            date,
            amount,
            raw_text,
            fund_id,
            document_id,
            description: None,
            recallable: None,
        }
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_recallable(mut self, recallable: Option<bool>) -> Self {
        self.recallable = recallable;
        self
    }

    /// Signed cash flow from the LP's point of view.
    ///
    /// Capital calls are outflows, distributions inflows. A positive adjustment adds to
    /// contributed capital (outflow); a negative one returns capital (inflow). Unknown
    /// records carry no cash flow.
    pub fn cash_flow(&self) -> Option<Decimal> {
        match self.category {
            TransactionCategory::CapitalCall => Some(-self.amount.abs()),
            TransactionCategory::Distribution => Some(self.amount.abs()),
            TransactionCategory::Adjustment => Some(-self.amount),
            TransactionCategory::Unknown => None,
        }
    }
}
