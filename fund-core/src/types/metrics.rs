use crate::types::{FundId, TransactionRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Performance metrics that can be computed and audited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Pic,
    Dpi,
    Irr,
}

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Pic => "PIC",
            MetricKind::Dpi => "DPI",
            MetricKind::Irr => "IRR",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pic" | "paid-in" | "paid_in_capital" => Ok(MetricKind::Pic),
            "dpi" => Ok(MetricKind::Dpi),
            "irr" => Ok(MetricKind::Irr),
            other => Err(format!("unknown metric: {}", other)),
        }
    }
}

/// Distributions to paid-in capital; undefined until capital has been called
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Dpi {
    Ratio(Decimal),
    Undefined,
}

impl Dpi {
    pub fn value(&self) -> Option<Decimal> {
        match self {
            Dpi::Ratio(value) => Some(*value),
            Dpi::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Dpi::Undefined)
    }
}

impl fmt::Display for Dpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dpi::Ratio(value) => write!(f, "{:.2}x", value),
            Dpi::Undefined => f.write_str("not applicable (no capital called yet)"),
        }
    }
}

/// Result of the IRR root search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IrrOutcome {
    Converged { rate: Decimal, iterations: u32 },
    NotConverged { reason: String },
}

impl IrrOutcome {
    pub fn not_converged(reason: impl Into<String>) -> Self {
        IrrOutcome::NotConverged {
            reason: reason.into(),
        }
    }

    pub fn rate(&self) -> Option<Decimal> {
        match self {
            IrrOutcome::Converged { rate, .. } => Some(*rate),
            IrrOutcome::NotConverged { .. } => None,
        }
    }
}

impl fmt::Display for IrrOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrrOutcome::Converged { rate, .. } => {
                write!(f, "{:.2}%", *rate * Decimal::ONE_HUNDRED)
            }
            IrrOutcome::NotConverged { reason } => {
                write!(f, "IRR could not be computed ({})", reason)
            }
        }
    }
}

/// Metrics derived from a fund's current transaction set. Never stored as source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub fund_id: FundId,
    pub pic: Decimal,
    pub total_distributions: Decimal,
    pub dpi: Dpi,
    pub irr: IrrOutcome,

    /// Every record that fed at least one metric, in input order
    pub breakdown: Vec<TransactionRecord>,

    /// Records left out of IRR because they carry no date
    pub irr_excluded: Vec<TransactionRecord>,

    /// Input problems worth a human look (e.g. PIC clamped at zero)
    pub anomalies: Vec<String>,
}
