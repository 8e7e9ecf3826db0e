use crate::metrics::irr::{xirr, CashFlow};
use chrono::NaiveDate;
use fund_core::{
    Dpi, FundId, IrrOutcome, MetricKind, MetricOverflow, MetricsSnapshot, TransactionCategory,
    TransactionRecord,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Paid-in capital, with the pre-clamp sum kept for anomaly reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaidInCapital {
    pub value: Decimal,
    pub unclamped: Decimal,
}

impl PaidInCapital {
    pub fn was_clamped(&self) -> bool {
        self.unclamped < Decimal::ZERO
    }
}

/// Valuation (NAV) treated as a final inflow when computing IRR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidualValue {
    pub date: NaiveDate,
    pub amount: Decimal,
}

impl ResidualValue {
    pub fn new(date: NaiveDate, amount: Decimal) -> Self {
        Self { date, amount }
    }
}

/// IRR together with the records it had to leave out
#[derive(Debug, Clone, PartialEq)]
pub struct IrrComputation {
    pub outcome: IrrOutcome,
    pub excluded: Vec<TransactionRecord>,
}

fn feeds_pic(record: &TransactionRecord) -> bool {
    matches!(
        record.category,
        TransactionCategory::CapitalCall | TransactionCategory::Adjustment
    )
}

fn feeds_dpi(record: &TransactionRecord) -> bool {
    feeds_pic(record) || record.category == TransactionCategory::Distribution
}

fn checked_total(mut amounts: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    amounts.try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
}

/// Σ|calls| + Σ adjustments (as recorded), floored at zero
pub fn compute_pic(records: &[TransactionRecord]) -> Result<PaidInCapital, MetricOverflow> {
    let unclamped = checked_total(records.iter().map(|record| match record.category {
        TransactionCategory::CapitalCall => record.amount.abs(),
        TransactionCategory::Adjustment => record.amount,
        _ => Decimal::ZERO,
    }))
    .ok_or(MetricOverflow::PaidInCapital)?;

    Ok(PaidInCapital {
        value: unclamped.max(Decimal::ZERO),
        unclamped,
    })
}

pub fn total_distributions(records: &[TransactionRecord]) -> Result<Decimal, MetricOverflow> {
    checked_total(
        records
            .iter()
            .filter(|r| r.category == TransactionCategory::Distribution)
            .map(|r| r.amount.abs()),
    )
    .ok_or(MetricOverflow::Distributions)
}

/// `Undefined` exactly when `pic` is zero
pub fn compute_dpi(total_distributions: Decimal, pic: Decimal) -> Result<Dpi, MetricOverflow> {
    if pic.is_zero() {
        return Ok(Dpi::Undefined);
    }
    total_distributions
        .checked_div(pic)
        .map(Dpi::Ratio)
        .ok_or(MetricOverflow::Dpi)
}

pub fn compute_irr(records: &[TransactionRecord]) -> IrrComputation {
    compute_irr_with_residual(records, None)
}

pub fn compute_irr_with_residual(
    records: &[TransactionRecord],
    residual: Option<ResidualValue>,
) -> IrrComputation {
    let mut flows = Vec::new();
    let mut excluded = Vec::new();

    for record in records {
        let Some(amount) = record.cash_flow() else {
            continue;
        };
        match record.date {
            Some(date) => flows.push(CashFlow::new(date, amount)),
            None => excluded.push(record.clone()),
        }
    }

    if let Some(residual) = residual {
        if !residual.amount.is_zero() {
            flows.push(CashFlow::new(residual.date, residual.amount));
        }
    }

    if !excluded.is_empty() {
        tracing::warn!("{} undated records excluded from IRR", excluded.len());
    }

    IrrComputation {
        outcome: xirr(&flows),
        excluded,
    }
}

/// Exactly the records a metric consumes: input order for PIC/DPI, chronological for IRR
pub fn breakdown(records: &[TransactionRecord], metric: MetricKind) -> Vec<TransactionRecord> {
    match metric {
        MetricKind::Pic => records.iter().filter(|r| feeds_pic(r)).cloned().collect(),
        MetricKind::Dpi => records.iter().filter(|r| feeds_dpi(r)).cloned().collect(),
        MetricKind::Irr => {
            let mut dated: Vec<TransactionRecord> = records
                .iter()
                .filter(|r| r.cash_flow().is_some() && r.date.is_some())
                .cloned()
                .collect();
            dated.sort_by_key(|r| r.date);
            dated
        }
    }
}

/// All metrics for one fund's transaction set
pub fn compute_snapshot(
    fund_id: FundId,
    records: &[TransactionRecord],
    residual: Option<ResidualValue>,
) -> MetricsSnapshot {
    let mut anomalies = Vec::new();

    let pic = match compute_pic(records) {
        Ok(pic) => {
            if pic.was_clamped() {
                anomalies.push(format!(
                    "Paid-in capital summed to {} and was clamped to 0; check adjustment signs",
                    pic.unclamped
                ));
            }
            Some(pic.value)
        }
        Err(e) => {
            anomalies.push(format!("{}; check for mis-extracted amounts", e));
            None
        }
    };
    let distributions = match total_distributions(records) {
        Ok(total) => Some(total),
        Err(e) => {
            anomalies.push(format!("{}; check for mis-extracted amounts", e));
            None
        }
    };
    let dpi = match (distributions, pic) {
        (Some(total), Some(pic)) => compute_dpi(total, pic).unwrap_or_else(|e| {
            anomalies.push(e.to_string());
            Dpi::Undefined
        }),
        _ => Dpi::Undefined,
    };
    let irr = compute_irr_with_residual(records, residual);

    let unknown = records
        .iter()
        .filter(|r| r.category == TransactionCategory::Unknown)
        .count();
    if unknown > 0 {
        anomalies.push(format!(
            "{} records from unclassified tables were ignored",
            unknown
        ));
    }

    for anomaly in &anomalies {
        tracing::warn!("Fund {}: {}", fund_id, anomaly);
    }

    MetricsSnapshot {
        fund_id,
        // Totals past the decimal range saturate; the anomaly says so
        pic: pic.unwrap_or(Decimal::MAX),
        total_distributions: distributions.unwrap_or(Decimal::MAX),
        dpi,
        irr: irr.outcome,
        breakdown: records.iter().filter(|r| feeds_dpi(r)).cloned().collect(),
        irr_excluded: irr.excluded,
        anomalies,
    }
}
