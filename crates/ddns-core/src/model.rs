//! Data model shared by every component
//!
//! - [`DomainRecord`]: a hostname binding identified by `(fqdn, record_type)`
//! - [`StoredRecord`]: a persisted, versioned row of a [`DomainRecord`]
//! - [`PublicAddress`]: the outcome of one address resolution
//! - [`UpdateBatch`]: upsert changes destined for one provider zone

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// TTL applied to every upserted record
pub const DEFAULT_TTL: u32 = 300;

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpFamily {
    V4,
    V6,
}

impl std::fmt::Display for IpFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpFamily::V4 => f.write_str("ipv4"),
            IpFamily::V6 => f.write_str("ipv6"),
        }
    }
}

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    #[serde(rename = "A")]
    A,
    /// AAAA record (IPv6)
    #[serde(rename = "AAAA")]
    Aaaa,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }

    /// Address family carried by this record type
    pub fn family(&self) -> IpFamily {
        match self {
            RecordType::A => IpFamily::V4,
            RecordType::Aaaa => IpFamily::V6,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            other => Err(crate::Error::invalid_input(format!(
                "Unsupported record type: {}",
                other
            ))),
        }
    }
}

/// Identity of a hostname binding
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub fqdn: String,
    #[serde(rename = "type")]
    pub record_type: RecordType,
}

impl RecordKey {
    pub fn new(fqdn: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            fqdn: fqdn.into(),
            record_type,
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.fqdn, self.record_type)
    }
}

/// A hostname bound to an address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainRecord {
    pub fqdn: String,
    pub record_type: RecordType,
    pub value: String,
}

impl DomainRecord {
    pub fn new(fqdn: impl Into<String>, record_type: RecordType, value: impl Into<String>) -> Self {
        Self {
            fqdn: fqdn.into(),
            record_type,
            value: value.into(),
        }
    }

    /// The `(fqdn, record_type)` identity of this record
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.fqdn.clone(), self.record_type)
    }

    /// Whether this record binds the given key
    pub fn matches(&self, key: &RecordKey) -> bool {
        self.fqdn == key.fqdn && self.record_type == key.record_type
    }
}

/// A persisted row of the record table
///
/// Rows are never deleted. Superseded values stay behind with
/// `active = false`, so at most one row per key is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub fqdn: String,
    pub record_type: RecordType,
    pub value: String,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub active: bool,
}

impl StoredRecord {
    /// Create a new active row stamped with the current time
    pub(crate) fn activate(record: &DomainRecord) -> Self {
        Self {
            fqdn: record.fqdn.clone(),
            record_type: record.record_type,
            value: record.value.clone(),
            updated_at: chrono::Utc::now(),
            active: true,
        }
    }

    pub fn to_domain_record(&self) -> DomainRecord {
        DomainRecord::new(self.fqdn.clone(), self.record_type, self.value.clone())
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.fqdn.clone(), self.record_type)
    }
}

/// Externally visible addresses, one optional slot per family
///
/// An empty slot means resolution for that family failed this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicAddress {
    pub v4: Option<Ipv4Addr>,
    pub v6: Option<Ipv6Addr>,
}

impl PublicAddress {
    /// The address for a family, formatted as a record value
    pub fn for_family(&self, family: IpFamily) -> Option<String> {
        match family {
            IpFamily::V4 => self.v4.map(|ip| ip.to_string()),
            IpFamily::V6 => self.v6.map(|ip| ip.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.v4.is_none() && self.v6.is_none()
    }
}

/// Change action understood by providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    /// Create the record, or replace its value if it exists
    Upsert,
}

/// A single record change inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordChange {
    pub action: ChangeAction,
    pub fqdn: String,
    pub record_type: RecordType,
    pub ttl: u32,
    pub value: String,
}

impl RecordChange {
    pub fn upsert(record: &DomainRecord) -> Self {
        Self {
            action: ChangeAction::Upsert,
            fqdn: record.fqdn.clone(),
            record_type: record.record_type,
            ttl: DEFAULT_TTL,
            value: record.value.clone(),
        }
    }
}

/// Changes destined for one provider zone in one cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBatch {
    pub zone_id: String,
    pub comment: String,
    pub changes: Vec<RecordChange>,
}

impl UpdateBatch {
    pub(crate) fn for_zone(zone_id: &str) -> Self {
        Self {
            zone_id: zone_id.to_string(),
            comment: format!("changes for zone id {}", zone_id),
            changes: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_parses_case_insensitively() {
        assert_eq!("a".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!("AAAA".parse::<RecordType>().unwrap(), RecordType::Aaaa);
        assert!("MX".parse::<RecordType>().is_err());
    }

    #[test]
    fn record_type_serializes_as_wire_name() {
        let json = serde_json::to_string(&RecordType::Aaaa).unwrap();
        assert_eq!(json, "\"AAAA\"");
    }

    #[test]
    fn public_address_formats_by_family() {
        let addr = PublicAddress {
            v4: Some(Ipv4Addr::new(10, 0, 0, 2)),
            v6: None,
        };
        assert_eq!(addr.for_family(IpFamily::V4).as_deref(), Some("10.0.0.2"));
        assert_eq!(addr.for_family(IpFamily::V6), None);
        assert!(!addr.is_empty());
        assert!(PublicAddress::default().is_empty());
    }

    #[test]
    fn upsert_uses_default_ttl() {
        let record = DomainRecord::new("a.example.com", RecordType::A, "1.2.3.4");
        let change = RecordChange::upsert(&record);
        assert_eq!(change.ttl, 300);
        assert_eq!(change.action, ChangeAction::Upsert);
    }
}
