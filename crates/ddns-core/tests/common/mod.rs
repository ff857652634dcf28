//! Test doubles and common utilities for reconciliation contract tests
//!
//! The doubles share their state through `Arc`s so a test can keep a
//! handle after moving a clone into the engine.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::EngineConfig;
use ddns_core::error::{Error, Result};
use ddns_core::model::{DomainRecord, PublicAddress, RecordKey, RecordType, UpdateBatch};
use ddns_core::registry::{ZoneRegistry, ZoneSubscription};
use ddns_core::state::MemoryRecordStore;
use ddns_core::traits::{AddressResolver, RecordStore, ZoneUpdater};
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A resolver returning whatever address the test last set
#[derive(Clone, Default)]
pub struct StaticResolver {
    address: Arc<Mutex<PublicAddress>>,
    resolve_call_count: Arc<AtomicUsize>,
}

impl StaticResolver {
    pub fn new(v4: Option<Ipv4Addr>, v6: Option<Ipv6Addr>) -> Self {
        let resolver = Self::default();
        resolver.set(v4, v6);
        resolver
    }

    pub fn v4(ip: [u8; 4]) -> Self {
        Self::new(Some(Ipv4Addr::from(ip)), None)
    }

    /// Change the address returned by subsequent resolutions
    pub fn set(&self, v4: Option<Ipv4Addr>, v6: Option<Ipv6Addr>) {
        *self.address.lock().unwrap() = PublicAddress { v4, v6 };
    }

    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self) -> PublicAddress {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        *self.address.lock().unwrap()
    }
}

/// A resolver that takes `delay` before answering
pub struct SlowResolver {
    pub delay: Duration,
    pub address: PublicAddress,
}

#[async_trait]
impl AddressResolver for SlowResolver {
    async fn resolve(&self) -> PublicAddress {
        tokio::time::sleep(self.delay).await;
        self.address
    }
}

/// A zone updater that records every batch and rejects configured zones
#[derive(Clone, Default)]
pub struct RecordingZoneUpdater {
    batches: Arc<Mutex<Vec<UpdateBatch>>>,
    failing_zones: Arc<Mutex<HashSet<String>>>,
}

impl RecordingZoneUpdater {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every batch for `zone_id`
    pub fn fail_zone(&self, zone_id: &str) {
        self.failing_zones.lock().unwrap().insert(zone_id.to_string());
    }

    /// Every batch received, accepted or rejected
    pub fn batches(&self) -> Vec<UpdateBatch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn zone_ids(&self) -> Vec<String> {
        self.batches().into_iter().map(|b| b.zone_id).collect()
    }
}

#[async_trait]
impl ZoneUpdater for RecordingZoneUpdater {
    async fn apply_batch(&self, batch: &UpdateBatch) -> Result<()> {
        self.batches.lock().unwrap().push(batch.clone());
        if self.failing_zones.lock().unwrap().contains(&batch.zone_id) {
            return Err(Error::provider("recording", format!("zone {} rejected", batch.zone_id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// A memory store whose writes fail for chosen hostnames
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryRecordStore,
    failing_fqdns: Arc<Mutex<HashSet<String>>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes_for(&self, fqdn: &str) {
        self.failing_fqdns.lock().unwrap().insert(fqdn.to_string());
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get_active_records(&self) -> Result<Vec<DomainRecord>> {
        self.inner.get_active_records().await
    }

    async fn update_record(&self, record: &DomainRecord) -> Result<()> {
        if self.failing_fqdns.lock().unwrap().contains(&record.fqdn) {
            return Err(Error::transaction(
                ddns_core::error::TransactionStage::Insert,
                "disk I/O error",
            ));
        }
        self.inner.update_record(record).await
    }

    async fn init_records(&self, records: &[DomainRecord]) -> Result<()> {
        self.inner.init_records(records).await
    }
}

/// A single-zone registry
pub fn zone(zone_id: &str, records: &[(&str, RecordType)]) -> ZoneSubscription {
    ZoneSubscription::new(
        zone_id,
        records
            .iter()
            .map(|(fqdn, record_type)| RecordKey::new(*fqdn, *record_type))
            .collect(),
    )
}

pub fn registry(zones: Vec<ZoneSubscription>) -> ZoneRegistry {
    ZoneRegistry::new(zones)
}

/// Engine configuration with a short cycle interval
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        poll_interval_secs: 1,
        event_channel_capacity: 100,
    }
}
