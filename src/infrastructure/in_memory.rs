use crate::domain::message::TransactionId;
use crate::domain::ports::TransactionStore;
use crate::domain::transaction::{StateTransition, TransactionRecord};
use crate::error::{RaError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;

/// A thread-safe in-memory transaction store.
///
/// Uses `Arc<RwLock<HashMap>>` to allow shared concurrent access; taking the
/// write side for every mutation serializes all writers, which gives the
/// per-id check-and-set semantics the engine relies on.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    records: Arc<RwLock<HashMap<TransactionId, TransactionRecord>>>,
}

impl InMemoryTransactionStore {
    /// Creates a new, empty in-memory transaction store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, record: TransactionRecord) -> Result<bool> {
        let mut records = self.records.write().await;
        match records.entry(record.id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(true)
            }
        }
    }

    async fn lookup(&self, id: &TransactionId) -> Result<Option<TransactionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn update(
        &self,
        id: &TransactionId,
        transition: StateTransition,
    ) -> Result<TransactionRecord> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| RaError::UnknownTransaction(id.clone()))?;
        record.apply(transition)?;
        Ok(record.clone())
    }

    async fn remove(&self, id: &TransactionId) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(id);
        Ok(())
    }

    async fn expire(&self, older_than: SystemTime) -> Result<usize> {
        let mut records = self.records.write().await;
        let mut affected = 0;
        records.retain(|_, record| {
            if record.created_at >= older_than {
                return true;
            }
            affected += 1;
            if record.state.is_terminal() {
                false
            } else {
                let _ = record.apply(StateTransition::Expire);
                true
            }
        });
        Ok(affected)
    }
}
