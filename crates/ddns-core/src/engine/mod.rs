//! Core DDNS engine
//!
//! The DdnsEngine drives reconciliation cycles:
//! - Resolving the public addresses via AddressResolver
//! - Diffing them against the RecordStore's active snapshot
//! - Persisting changed records
//! - Submitting one batch per affected zone to each provider account
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ AddressResolver │─── PublicAddress ───┐
//! └─────────────────┘                     │
//!                                         ▼
//!                                ┌──────────────┐
//!                                │ DdnsEngine   │
//!                                └──────────────┘
//!                                         │
//!         ┌───────────────────────────────┼───────────────────────────┐
//!         │                               │                           │
//!         ▼                               ▼                           ▼
//! ┌─────────────┐               ┌──────────────────┐         ┌─────────────┐
//! │ RecordStore │               │ build_batches +  │         │   Events    │
//! │ (diff/save) │               │ submit_batches   │         │  (notify)   │
//! └─────────────┘               └──────────────────┘         └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Resolve IPv4 and IPv6 (independently fallible)
//! 2. Build candidate records for every subscribed key whose family resolved
//! 3. Keep candidates whose key is not active or whose value differs
//! 4. Persist each changed record; drop the ones that fail to persist
//! 5. Build batches per account and submit all of them

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::batch::{build_batches, submit_batches};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::model::{DomainRecord, PublicAddress, RecordKey, RecordType};
use crate::registry::ZoneRegistry;
use crate::traits::{AddressResolver, RecordStore, ZoneUpdater};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        accounts_count: usize,
    },

    /// Reconciliation cycle started
    CycleStarted,

    /// Public addresses resolved (absent slots failed)
    AddressResolved {
        v4: Option<Ipv4Addr>,
        v6: Option<Ipv6Addr>,
    },

    /// A changed record was persisted
    RecordChanged {
        fqdn: String,
        record_type: RecordType,
        previous_value: Option<String>,
        new_value: String,
    },

    /// A changed record could not be persisted and was dropped for this cycle
    PersistFailed {
        fqdn: String,
        record_type: RecordType,
        error: String,
    },

    /// Cycle finished without submission failures
    CycleCompleted {
        changed: usize,
        batches: usize,
    },

    /// Cycle finished with an error
    CycleFailed {
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// A provider account: its zones and the updater that talks to it
pub struct ProviderAccount {
    /// Account name (for logging)
    pub name: String,

    /// Zones managed through this account
    pub registry: ZoneRegistry,

    /// Provider client
    pub updater: Box<dyn ZoneUpdater>,
}

impl ProviderAccount {
    pub fn new(
        name: impl Into<String>,
        registry: ZoneRegistry,
        updater: Box<dyn ZoneUpdater>,
    ) -> Self {
        Self {
            name: name.into(),
            registry,
            updater,
        }
    }
}

/// Outcome of a cycle that did not fail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Addresses resolved this cycle
    pub address: PublicAddress,

    /// Changed records that were persisted and submitted
    pub persisted: Vec<DomainRecord>,

    /// Changed records dropped because persisting them failed
    pub persist_failures: usize,

    /// Zone batches accepted by providers
    pub batches: usize,
}

impl CycleReport {
    /// Whether the cycle changed nothing
    pub fn is_noop(&self) -> bool {
        self.persisted.is_empty() && self.persist_failures == 0
    }
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`], or drive cycles with [`DdnsEngine::run_cycle()`]
/// 3. Engine runs until shutdown signal received
///
/// ## Scheduling
///
/// Cycles run on a fixed interval on a single task. A cycle always returns
/// before the next one starts, so batches for the same hostname never
/// overlap.
pub struct DdnsEngine {
    /// Public address discovery
    resolver: Box<dyn AddressResolver>,

    /// Versioned record store
    store: Arc<dyn RecordStore>,

    /// Provider accounts to update
    accounts: Vec<ProviderAccount>,

    /// Interval between cycles
    poll_interval: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        store: Arc<dyn RecordStore>,
        accounts: Vec<ProviderAccount>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        if accounts.is_empty() {
            return Err(Error::config("No provider accounts configured"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            resolver,
            store,
            accounts,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Run the engine until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Shutdown during a cycle abandons it; any open store transaction is
    /// rolled back.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(EngineEvent::Started {
            accounts_count: self.accounts.len(),
        });
        info!(
            "Engine started: {} account(s), cycle every {:?}",
            self.accounts.len(),
            self.poll_interval
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let stop = tokio::select! {
                        result = self.run_cycle() => {
                            self.report_cycle(result);
                            false
                        }
                        _ = &mut shutdown => {
                            warn!("Shutdown signal received, abandoning in-flight cycle");
                            true
                        }
                    };
                    if stop {
                        break;
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        info!("Engine stopped");

        Ok(())
    }

    /// Run one reconciliation cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: Nothing to do, or every batch was accepted
    /// - `Err(Error::Store)`: The active snapshot could not be read
    /// - `Err(Error::AggregateSubmission)`: At least one batch failed; all were attempted
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.emit_event(EngineEvent::CycleStarted);

        let address = self.resolver.resolve().await;
        self.emit_event(EngineEvent::AddressResolved {
            v4: address.v4,
            v6: address.v6,
        });
        if address.is_empty() {
            warn!("No public address resolved this cycle");
        }

        let candidates = self.candidates(&address);
        let active = self.store.get_active_records().await?;
        let changed = diff_records(&candidates, &active);
        debug!(
            "{} candidate record(s), {} changed",
            candidates.len(),
            changed.len()
        );

        let mut report = CycleReport {
            address,
            ..CycleReport::default()
        };

        for (record, previous_value) in changed {
            match self.store.update_record(&record).await {
                Ok(()) => {
                    info!(
                        "{} changed: {} -> {}",
                        record.key(),
                        previous_value.as_deref().unwrap_or("<none>"),
                        record.value
                    );
                    self.emit_event(EngineEvent::RecordChanged {
                        fqdn: record.fqdn.clone(),
                        record_type: record.record_type,
                        previous_value,
                        new_value: record.value.clone(),
                    });
                    report.persisted.push(record);
                }
                Err(e) => {
                    error!("Failed to persist {}: {}", record.key(), e);
                    self.emit_event(EngineEvent::PersistFailed {
                        fqdn: record.fqdn.clone(),
                        record_type: record.record_type,
                        error: e.to_string(),
                    });
                    report.persist_failures += 1;
                }
            }
        }

        if report.persisted.is_empty() {
            return Ok(report);
        }

        let mut attempted = 0;
        let mut failed = 0;
        for account in &self.accounts {
            let batches = build_batches(&report.persisted, &account.registry);
            if batches.is_empty() {
                continue;
            }
            attempted += batches.len();

            match submit_batches(account.updater.as_ref(), &batches).await {
                Ok(summary) => report.batches += summary.batches,
                Err(Error::AggregateSubmission {
                    failed: account_failed,
                    attempted: account_attempted,
                }) => {
                    warn!(
                        "Account {}: {} of {} zone batch(es) failed",
                        account.name, account_failed, account_attempted
                    );
                    failed += account_failed;
                    report.batches += account_attempted - account_failed;
                }
                Err(e) => {
                    error!("Account {}: submission failed: {}", account.name, e);
                    failed += batches.len();
                }
            }
        }

        if failed > 0 {
            return Err(Error::AggregateSubmission { failed, attempted });
        }

        Ok(report)
    }

    /// Candidate records: every subscribed key whose family resolved
    fn candidates(&self, address: &PublicAddress) -> Vec<DomainRecord> {
        let mut seen: HashSet<&RecordKey> = HashSet::new();
        let mut candidates = Vec::new();

        for account in &self.accounts {
            for key in account.registry.keys() {
                if !seen.insert(key) {
                    continue;
                }
                if let Some(value) = address.for_family(key.record_type.family()) {
                    candidates.push(DomainRecord::new(key.fqdn.clone(), key.record_type, value));
                }
            }
        }

        candidates
    }

    fn report_cycle(&self, result: Result<CycleReport>) {
        match result {
            Ok(report) => {
                if report.is_noop() {
                    debug!("Cycle complete, nothing changed");
                } else {
                    info!(
                        "Cycle complete: {} record(s) changed, {} dropped, {} zone batch(es) submitted",
                        report.persisted.len(),
                        report.persist_failures,
                        report.batches
                    );
                }
                self.emit_event(EngineEvent::CycleCompleted {
                    changed: report.persisted.len(),
                    batches: report.batches,
                });
            }
            Err(e) => {
                error!("Cycle failed: {}", e);
                self.emit_event(EngineEvent::CycleFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Full channel: drop the event rather than block the cycle
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. Consider increasing event_channel_capacity."
            );
        }
    }
}

/// Candidates whose key is absent from `active` or whose value differs,
/// paired with the previously active value
fn diff_records(
    candidates: &[DomainRecord],
    active: &[DomainRecord],
) -> Vec<(DomainRecord, Option<String>)> {
    let snapshot: HashMap<RecordKey, &str> = active
        .iter()
        .map(|record| (record.key(), record.value.as_str()))
        .collect();

    candidates
        .iter()
        .filter_map(|candidate| match snapshot.get(&candidate.key()) {
            Some(value) if *value == candidate.value => None,
            previous => Some((candidate.clone(), previous.map(|v| v.to_string()))),
        })
        .collect()
}
