use anyhow::{Context, Result};
use fund_core::{DocumentId, FundId, LedgerError, TransactionLedger, TransactionRecord};
use lmdb::{Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use std::path::Path;
use tracing;

const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// LMDB-backed transaction ledger
///
/// Single named database `transactions`:
/// - `{fund_id}:documents` → JSON list of document ids, in first-commit order
/// - `{fund_id}:{document_id}` → JSON list of that document's records
///
/// A batch is written in one read-write transaction, and a fund is read in one read-only
/// transaction, so readers always see whole batches.
pub struct LmdbLedger {
    env: Environment,
    db: Database,
}

impl LmdbLedger {
    /// Open (or create) a ledger at `db_path`
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::open_with_map_size(db_path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size<P: AsRef<Path>>(db_path: P, map_size: usize) -> Result<Self> {
        let db_path = db_path.as_ref();

        std::fs::create_dir_all(db_path)
            .with_context(|| format!("Failed to create LMDB directory {}", db_path.display()))?;

        tracing::info!("Opening LMDB transaction ledger at: {}", db_path.display());

        let env = Environment::new()
            .set_max_dbs(4)
            .set_map_size(map_size)
            .open(db_path)
            .context("Failed to open LMDB environment")?;

        let db = env
            .create_db(Some("transactions"), DatabaseFlags::empty())
            .context("Failed to open transactions database")?;

        Ok(Self { env, db })
    }

    fn documents_key(fund_id: FundId) -> String {
        format!("{}:documents", fund_id)
    }

    fn batch_key(fund_id: FundId, document_id: DocumentId) -> String {
        format!("{}:{}", fund_id, document_id)
    }

    fn read_documents<T: Transaction>(
        &self,
        txn: &T,
        fund_id: FundId,
    ) -> Result<Vec<DocumentId>, LedgerError> {
        match txn.get(self.db, &Self::documents_key(fund_id)) {
            Ok(bytes) => Ok(serde_json::from_slice(bytes)?),
            Err(lmdb::Error::NotFound) => Ok(Vec::new()),
            Err(e) => Err(storage_error(e)),
        }
    }
}

fn storage_error(e: lmdb::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

impl TransactionLedger for LmdbLedger {
    fn commit_batch(
        &self,
        fund_id: FundId,
        document_id: DocumentId,
        records: &[TransactionRecord],
    ) -> Result<(), LedgerError> {
        let mut txn = self.env.begin_rw_txn().map_err(storage_error)?;

        let mut documents = self.read_documents(&txn, fund_id)?;
        if !documents.contains(&document_id) {
            documents.push(document_id);
        }

        let documents_json = serde_json::to_vec(&documents)?;
        let records_json = serde_json::to_vec(records)?;

        txn.put(
            self.db,
            &Self::documents_key(fund_id),
            &documents_json,
            WriteFlags::empty(),
        )
        .map_err(storage_error)?;
        txn.put(
            self.db,
            &Self::batch_key(fund_id, document_id),
            &records_json,
            WriteFlags::empty(),
        )
        .map_err(storage_error)?;

        txn.commit().map_err(storage_error)?;

        tracing::debug!(
            "Committed {} records for fund {} document {} to LMDB",
            records.len(),
            fund_id,
            document_id
        );
        Ok(())
    }

    fn fetch_transactions(&self, fund_id: FundId) -> Result<Vec<TransactionRecord>, LedgerError> {
        let txn = self.env.begin_ro_txn().map_err(storage_error)?;
        let documents = self.read_documents(&txn, fund_id)?;

        let mut records = Vec::new();
        for document_id in documents {
            match txn.get(self.db, &Self::batch_key(fund_id, document_id)) {
                Ok(bytes) => {
                    let batch: Vec<TransactionRecord> = serde_json::from_slice(bytes)?;
                    records.extend(batch);
                }
                Err(lmdb::Error::NotFound) => {
                    tracing::warn!(
                        "Fund {} lists document {} but its batch is missing",
                        fund_id,
                        document_id
                    );
                }
                Err(e) => return Err(storage_error(e)),
            }
        }

        Ok(records)
    }
}
