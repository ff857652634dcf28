// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Keeps the same versioned-row protocol as the SQLite store without
// persistence. Useful for testing and for embedding the engine where
// durability is provided elsewhere.
//
// ## Crash Behavior
//
// - All rows are lost on restart/crash
// - First cycle after a restart treats every subscribed record as changed

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{DomainRecord, RecordKey, StoredRecord};
use crate::traits::RecordStore;

/// In-memory record store
///
/// Rows live in a `Vec` behind a `RwLock`; a write holds the lock across
/// both the deactivate and insert steps.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::model::{DomainRecord, RecordType};
/// use ddns_core::state::MemoryRecordStore;
/// use ddns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     store
///         .update_record(&DomainRecord::new("example.com", RecordType::A, "1.2.3.4"))
///         .await?;
///
///     let active = store.get_active_records().await?;
///     assert_eq!(active[0].value, "1.2.3.4");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    rows: Arc<RwLock<Vec<StoredRecord>>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory record store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of rows, active or not
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Check if the store has no rows
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    /// Every row, oldest first
    pub async fn rows(&self) -> Vec<StoredRecord> {
        self.rows.read().await.clone()
    }

    /// Every row written for `key`, oldest first
    pub async fn history(&self, key: &RecordKey) -> Vec<StoredRecord> {
        self.rows
            .read()
            .await
            .iter()
            .filter(|row| row.key() == *key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_active_records(&self) -> Result<Vec<DomainRecord>, Error> {
        let guard = self.rows.read().await;
        Ok(guard
            .iter()
            .filter(|row| row.active)
            .map(StoredRecord::to_domain_record)
            .collect())
    }

    async fn update_record(&self, record: &DomainRecord) -> Result<(), Error> {
        let mut guard = self.rows.write().await;
        let key = record.key();
        for row in guard.iter_mut().filter(|row| row.active && row.key() == key) {
            row.active = false;
        }
        guard.push(StoredRecord::activate(record));
        Ok(())
    }

    async fn init_records(&self, records: &[DomainRecord]) -> Result<(), Error> {
        let mut guard = self.rows.write().await;
        for record in records {
            let key = record.key();
            for row in guard.iter_mut().filter(|row| row.active && row.key() == key) {
                row.active = false;
            }
            guard.push(StoredRecord::activate(record));
        }
        Ok(())
    }
}
