use crate::domain::message::TransactionId;
use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{StateTransition, TransactionRecord};
use crate::error::{RaError, Result, StoreError};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;

/// Column Family for storing transaction records.
pub const CF_TRANSACTIONS: &str = "transactions";

impl From<rocksdb::Error> for StoreError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// A persistent transaction store using RocksDB, so waiting transactions
/// survive process restarts between a deferred upstream exchange and its
/// asynchronous answer.
///
/// Records are keyed by the raw transaction id bytes and stored as JSON in a
/// dedicated column family. Mutations take a single writer lock to get the
/// same check-and-set semantics as the in-memory store.
#[derive(Clone)]
pub struct RocksDbTransactionStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbTransactionStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the `transactions` column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_transactions = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_transactions])
            .map_err(StoreError::from)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_TRANSACTIONS)
            .ok_or_else(|| {
                RaError::Store(StoreError::Unavailable(
                    "transactions column family not found".into(),
                ))
            })
    }

    fn get(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        let cf = self.cf()?;
        let Some(bytes) = self.db.get_cf(cf, id.as_bytes()).map_err(StoreError::from)? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes)
            .map_err(|err| StoreError::Corrupt(format!("transaction {id}: {err}")))?;
        Ok(Some(record))
    }

    fn put(&self, record: &TransactionRecord) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(record)
            .map_err(|err| StoreError::Corrupt(format!("transaction {}: {err}", record.id)))?;
        self.db
            .put_cf(cf, record.id.as_bytes(), value)
            .map_err(StoreError::from)?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for RocksDbTransactionStore {
    async fn create(&self, record: TransactionRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if self.get(&record.id)?.is_some() {
            return Ok(false);
        }
        self.put(&record)?;
        Ok(true)
    }

    async fn lookup(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        self.get(id)
    }

    async fn update(
        &self,
        id: &TransactionId,
        transition: StateTransition,
    ) -> Result<TransactionRecord> {
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .get(id)?
            .ok_or_else(|| RaError::UnknownTransaction(id.clone()))?;
        record.apply(transition)?;
        self.put(&record)?;
        Ok(record)
    }

    async fn remove(&self, id: &TransactionId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf()?;
        self.db
            .delete_cf(cf, id.as_bytes())
            .map_err(StoreError::from)?;
        Ok(())
    }

    async fn expire(&self, older_than: SystemTime) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let cf = self.cf()?;
        let mut affected = 0;

        let mut expired = Vec::new();
        let mut dropped = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, value) = item.map_err(StoreError::from)?;
            let record: TransactionRecord = serde_json::from_slice(&value)
                .map_err(|err| StoreError::Corrupt(format!("stored record: {err}")))?;
            if record.created_at >= older_than {
                continue;
            }
            if record.state.is_terminal() {
                dropped.push(key.to_vec());
            } else {
                expired.push(record);
            }
        }

        for key in dropped {
            self.db.delete_cf(cf, key).map_err(StoreError::from)?;
            affected += 1;
        }
        for mut record in expired {
            let _ = record.apply(StateTransition::Expire);
            self.put(&record)?;
            affected += 1;
        }
        Ok(affected)
    }
}
