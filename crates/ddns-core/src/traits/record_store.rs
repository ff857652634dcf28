// # Record Store Trait
//
// Defines the interface for the durable, versioned record table.
//
// ## Purpose
//
// The store holds the last address pushed for each `(fqdn, record_type)`.
// Every write supersedes the previous row instead of overwriting it, so
// the table doubles as an audit trail.
//
// ## Implementations
//
// - SQLite: [`crate::state::SqliteRecordStore`]
// - In-memory: [`crate::state::MemoryRecordStore`]

use async_trait::async_trait;

use crate::model::DomainRecord;

/// Trait for record store implementations
///
/// # Invariant
///
/// At most one active row exists per `(fqdn, record_type)` key. The
/// invariant is upheld by the write protocol of [`RecordStore::update_record`],
/// not by the storage engine.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// Stores perform persistent I/O but never decide when to update, talk to
/// providers, or resolve addresses.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get every active record
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DomainRecord>)`: Active records, empty if the store is empty
    /// - `Err(Error::Store)`: Connectivity or query failure
    ///
    /// A row that cannot be decoded is logged and skipped.
    async fn get_active_records(&self) -> Result<Vec<DomainRecord>, crate::Error>;

    /// Replace the active value for the record's key
    ///
    /// Deactivates the current active row (if any) and inserts a new active
    /// row stamped with the current time, in a single transaction.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Both steps committed
    /// - `Err(Error::Transaction)`: Nothing was applied
    async fn update_record(&self, record: &DomainRecord) -> Result<(), crate::Error>;

    /// Seed the store with newly active records
    ///
    /// All records are inserted in one transaction; a single failure rolls
    /// back the whole batch.
    async fn init_records(&self, records: &[DomainRecord]) -> Result<(), crate::Error>;
}
