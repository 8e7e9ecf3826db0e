use crate::metrics::calculator::{breakdown, compute_snapshot, ResidualValue};
use anyhow::{Context, Result};
use fund_core::{FundId, MetricKind, MetricsSnapshot, TransactionLedger, TransactionRecord};
use std::sync::Arc;

/// Read-side metrics over the transaction ledger. Nothing computed here is stored.
pub struct FundMetricsService {
    ledger: Arc<dyn TransactionLedger>,
}

impl FundMetricsService {
    pub fn new(ledger: Arc<dyn TransactionLedger>) -> Self {
        Self { ledger }
    }

    fn fetch(&self, fund_id: FundId) -> Result<Vec<TransactionRecord>> {
        self.ledger
            .fetch_transactions(fund_id)
            .with_context(|| format!("Failed to fetch transactions for fund {}", fund_id))
    }

    pub fn get_metrics(&self, fund_id: FundId) -> Result<MetricsSnapshot> {
        self.get_metrics_with_residual(fund_id, None)
    }

    /// Metrics with a NAV treated as the final IRR inflow
    pub fn get_metrics_with_residual(
        &self,
        fund_id: FundId,
        residual: Option<ResidualValue>,
    ) -> Result<MetricsSnapshot> {
        let records = self.fetch(fund_id)?;
        tracing::info!(
            "Computing metrics for fund {} over {} transactions",
            fund_id,
            records.len()
        );
        Ok(compute_snapshot(fund_id, &records, residual))
    }

    pub fn get_breakdown(
        &self,
        fund_id: FundId,
        metric: MetricKind,
    ) -> Result<Vec<TransactionRecord>> {
        let records = self.fetch(fund_id)?;
        Ok(breakdown(&records, metric))
    }
}
