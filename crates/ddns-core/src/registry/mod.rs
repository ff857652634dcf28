//! Zone registry
//!
//! Maps provider zone identifiers to the `(fqdn, record_type)` pairs each
//! zone is responsible for. Built once from configuration per provider
//! account and immutable afterwards.
//!
//! ## Usage
//!
//! ```rust
//! use ddns_core::model::{RecordKey, RecordType};
//! use ddns_core::registry::{ZoneRegistry, ZoneSubscription};
//!
//! let registry = ZoneRegistry::new(vec![ZoneSubscription::new(
//!     "zone-1",
//!     vec![RecordKey::new("home.example.com", RecordType::A)],
//! )]);
//!
//! assert_eq!(registry.keys().count(), 1);
//! ```

use std::collections::HashSet;

use crate::config::ZoneConfig;
use crate::model::RecordKey;

/// A provider zone and the records it manages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSubscription {
    /// Opaque provider zone identifier
    pub zone_id: String,

    /// Managed keys, in configuration order
    pub records: Vec<RecordKey>,
}

impl ZoneSubscription {
    pub fn new(zone_id: impl Into<String>, records: Vec<RecordKey>) -> Self {
        Self {
            zone_id: zone_id.into(),
            records,
        }
    }
}

impl From<&ZoneConfig> for ZoneSubscription {
    fn from(zone: &ZoneConfig) -> Self {
        Self::new(zone.id.clone(), zone.records.clone())
    }
}

/// The zones of one provider account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneRegistry {
    zones: Vec<ZoneSubscription>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<ZoneSubscription>) -> Self {
        Self { zones }
    }

    /// Build a registry from configured zones
    pub fn from_config(zones: &[ZoneConfig]) -> Self {
        Self::new(zones.iter().map(ZoneSubscription::from).collect())
    }

    /// Zones in configuration order
    pub fn zones(&self) -> &[ZoneSubscription] {
        &self.zones
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Every subscribed key, once, in configuration order
    pub fn keys(&self) -> impl Iterator<Item = &RecordKey> {
        let mut seen = HashSet::new();
        self.zones
            .iter()
            .flat_map(|zone| zone.records.iter())
            .filter(move |key| seen.insert(*key))
    }

    /// Identifiers of the zones managing `key`
    pub fn zones_for(&self, key: &RecordKey) -> Vec<&str> {
        self.zones
            .iter()
            .filter(|zone| zone.records.contains(key))
            .map(|zone| zone.zone_id.as_str())
            .collect()
    }
}
