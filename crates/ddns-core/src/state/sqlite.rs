// # SQLite Record Store
//
// sqlx-backed implementation of RecordStore.
//
// ## Schema
//
// One table, no uniqueness constraint:
//
// ```sql
// ddns_domains(fqdn, update_time, register_type, ip, active)
// ```
//
// The single-active-row invariant is kept by the write protocol:
// deactivate the current row, then insert the new one, in one transaction.
//
// ## Crash Behavior
//
// - A transaction that has not committed leaves no trace
// - Dropping an in-flight `update_record` future rolls the transaction back
// - History rows survive restarts and are never deleted

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::error::{Error, Result, TransactionStage};
use crate::model::{DomainRecord, RecordKey, RecordType, StoredRecord};
use crate::traits::RecordStore;

/// Database location that selects an in-memory database
pub const MEMORY_LOCATION: &str = ":memory:";

const DEFAULT_MAX_CONNECTIONS: u32 = 4;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS ddns_domains (
        fqdn TEXT NOT NULL,
        update_time TEXT NOT NULL,
        register_type TEXT NOT NULL,
        ip TEXT NOT NULL,
        active BOOLEAN NOT NULL
    )";

const ACTIVE_RECORDS: &str = "SELECT fqdn, ip, register_type FROM ddns_domains
        WHERE active = 1
        ORDER BY rowid";

const RECORD_HISTORY: &str = "SELECT fqdn, update_time, register_type, ip, active FROM ddns_domains
        WHERE fqdn = ? AND register_type = ?
        ORDER BY rowid";

const INSERT_RECORD: &str = "INSERT INTO ddns_domains
        (fqdn, update_time, register_type, ip, active)
        VALUES (?, ?, ?, ?, 1)";

const DEACTIVATE_RECORD: &str = "UPDATE ddns_domains SET active = 0
        WHERE fqdn = ? AND register_type = ? AND active = 1";

/// SQLite record store
///
/// Cloning is cheap; clones share the same connection pool.
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::model::{DomainRecord, RecordType};
/// use ddns_core::state::SqliteRecordStore;
/// use ddns_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteRecordStore::connect("/var/lib/ddns/ddns.db").await?;
///
///     store
///         .update_record(&DomainRecord::new("home.example.com", RecordType::A, "10.0.0.2"))
///         .await?;
///
///     let active = store.get_active_records().await?;
///     assert_eq!(active.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open the database and create the schema if absent
    ///
    /// `location` is a file path (created if missing) or [`MEMORY_LOCATION`].
    /// If schema creation fails the freshly opened pool is closed.
    pub async fn connect(location: &str) -> Result<Self> {
        let connected = if location == MEMORY_LOCATION {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| Error::initialization(format!("invalid database location: {}", e)))?;
            // An in-memory database lives only as long as its connection.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await
        } else {
            let options = SqliteConnectOptions::new()
                .filename(location)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(DEFAULT_MAX_CONNECTIONS)
                .connect_with(options)
                .await
        };
        let pool = connected.map_err(|e| {
            Error::initialization(format!("unable to open database {}: {}", location, e))
        })?;

        if let Err(e) = sqlx::query(CREATE_TABLE).execute(&pool).await {
            pool.close().await;
            return Err(Error::initialization(format!(
                "unable to create table in {}: {}",
                location, e
            )));
        }

        debug!("Record store ready at {}", location);
        Ok(Self { pool })
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Every row ever written for `key`, oldest first
    pub async fn history(&self, key: &RecordKey) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(RECORD_HISTORY)
            .bind(&key.fqdn)
            .bind(key.record_type.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::store(format!("unable to read history for {}: {}", key, e)))?;

        rows.iter().map(decode_stored_row).collect()
    }

    /// Close the pool, waiting for checked-out connections
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_active_row(row: &SqliteRow) -> Result<DomainRecord> {
    let fqdn: String = row.try_get("fqdn").map_err(|e| Error::store(e.to_string()))?;
    let value: String = row.try_get("ip").map_err(|e| Error::store(e.to_string()))?;
    let record_type: String = row
        .try_get("register_type")
        .map_err(|e| Error::store(e.to_string()))?;

    Ok(DomainRecord::new(fqdn, record_type.parse::<RecordType>()?, value))
}

fn decode_stored_row(row: &SqliteRow) -> Result<StoredRecord> {
    let record = decode_active_row(row)?;
    let update_time: String = row
        .try_get("update_time")
        .map_err(|e| Error::store(e.to_string()))?;
    let active: bool = row.try_get("active").map_err(|e| Error::store(e.to_string()))?;
    let updated_at = DateTime::parse_from_rfc3339(&update_time)
        .map_err(|e| Error::store(format!("invalid update_time {}: {}", update_time, e)))?
        .with_timezone(&Utc);

    Ok(StoredRecord {
        fqdn: record.fqdn,
        record_type: record.record_type,
        value: record.value,
        updated_at,
        active,
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_active_records(&self) -> Result<Vec<DomainRecord>> {
        let rows = sqlx::query(ACTIVE_RECORDS)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::store(format!("unable to read active records: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match decode_active_row(row) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record row: {}", e),
            }
        }

        Ok(records)
    }

    async fn update_record(&self, record: &DomainRecord) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::transaction(TransactionStage::Begin, e))?;

        sqlx::query(DEACTIVATE_RECORD)
            .bind(&record.fqdn)
            .bind(record.record_type.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::transaction(TransactionStage::Deactivate, e))?;

        sqlx::query(INSERT_RECORD)
            .bind(&record.fqdn)
            .bind(Utc::now().to_rfc3339())
            .bind(record.record_type.as_str())
            .bind(&record.value)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::transaction(TransactionStage::Insert, e))?;

        tx.commit()
            .await
            .map_err(|e| Error::transaction(TransactionStage::Commit, e))?;

        debug!("Stored {} -> {}", record.key(), record.value);
        Ok(())
    }

    async fn init_records(&self, records: &[DomainRecord]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::transaction(TransactionStage::Begin, e))?;

        let now = Utc::now().to_rfc3339();
        for record in records {
            // A later record for the same key supersedes an earlier one.
            sqlx::query(DEACTIVATE_RECORD)
                .bind(&record.fqdn)
                .bind(record.record_type.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::transaction(TransactionStage::Deactivate, e))?;

            sqlx::query(INSERT_RECORD)
                .bind(&record.fqdn)
                .bind(&now)
                .bind(record.record_type.as_str())
                .bind(&record.value)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::transaction(TransactionStage::Insert, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| Error::transaction(TransactionStage::Commit, e))?;

        debug!("Seeded {} record(s)", records.len());
        Ok(())
    }
}

/// Process-wide store handle, initialized on first use
///
/// Construct one at startup and pass it to whoever needs the store.
/// Concurrent first callers of [`SharedRecordStore::get`] wait on a single
/// initialization; later calls reuse the same pool. A failed initialization
/// is returned to its caller and the next call tries again.
#[derive(Debug)]
pub struct SharedRecordStore {
    location: String,
    store: OnceCell<SqliteRecordStore>,
}

impl SharedRecordStore {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            store: OnceCell::new(),
        }
    }

    /// The store, opening it and creating the schema on first call
    pub async fn get(&self) -> Result<&SqliteRecordStore> {
        self.store
            .get_or_try_init(|| SqliteRecordStore::connect(&self.location))
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.store.initialized()
    }

    /// Close the pool if the store was ever opened
    pub async fn close(&self) {
        if let Some(store) = self.store.get() {
            store.close().await;
            debug!("Record store at {} closed", self.location);
        }
    }
}
