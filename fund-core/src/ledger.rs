//! Transaction ledger abstraction.
//!
//! The ledger is the source of truth for extracted transactions; metrics are always recomputed
//! from it. Records are committed per document so a re-ingested document replaces its own rows
//! without touching other documents of the same fund.

use crate::error::LedgerError;
use crate::types::{DocumentId, FundId, TransactionRecord};
use std::collections::HashMap;
use std::sync::RwLock;

pub trait TransactionLedger: Send + Sync {
    /// Atomically store all records of one document, replacing any earlier batch for it
    fn commit_batch(
        &self,
        fund_id: FundId,
        document_id: DocumentId,
        records: &[TransactionRecord],
    ) -> Result<(), LedgerError>;

    /// All records of a fund, documents in first-commit order, rows in extraction order
    fn fetch_transactions(&self, fund_id: FundId) -> Result<Vec<TransactionRecord>, LedgerError>;
}

type DocumentBatches = Vec<(DocumentId, Vec<TransactionRecord>)>;

/// Process-local ledger for tests and one-shot CLI runs
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    funds: RwLock<HashMap<FundId, DocumentBatches>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TransactionLedger for InMemoryLedger {
    fn commit_batch(
        &self,
        fund_id: FundId,
        document_id: DocumentId,
        records: &[TransactionRecord],
    ) -> Result<(), LedgerError> {
        let mut funds = self.funds.write().map_err(|_| LedgerError::Poisoned)?;
        let batches = funds.entry(fund_id).or_default();

        match batches.iter_mut().find(|(id, _)| *id == document_id) {
            Some((_, existing)) => *existing = records.to_vec(),
            None => batches.push((document_id, records.to_vec())),
        }

        tracing::debug!(
            "Committed {} records for fund {} document {}",
            records.len(),
            fund_id,
            document_id
        );
        Ok(())
    }

    fn fetch_transactions(&self, fund_id: FundId) -> Result<Vec<TransactionRecord>, LedgerError> {
        let funds = self.funds.read().map_err(|_| LedgerError::Poisoned)?;
        Ok(funds
            .get(&fund_id)
            .map(|batches| {
                batches
                    .iter()
                    .flat_map(|(_, records)| records.iter().cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}
