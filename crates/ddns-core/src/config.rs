//! Configuration types for the DDNS system
//!
//! Configuration is read from a structured source addressed by dot-separated
//! logical paths (e.g. `ddns.storage.sqlite.db`). [`ConfigDecoder`] exposes a
//! closed set of typed decoders; [`YamlConfigSource`] implements it over a
//! YAML document.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::RecordKey;

/// Path of the database location string
pub const DATABASE_PATH: &str = "ddns.storage.sqlite.db";

/// Path of the address resolver settings
pub const RESOLVER_PATH: &str = "ddns.public-ip-api.ipify";

/// Path of the Cloudflare account list
pub const ACCOUNTS_PATH: &str = "ddns.dns-server.cloudflare";

/// Path of the optional event channel capacity
pub const EVENT_CHANNEL_CAPACITY_PATH: &str = "ddns.engine.event-channel-capacity";

/// Typed access to a structured configuration source
pub trait ConfigDecoder: Send + Sync {
    /// Decode a string value
    fn decode_string(&self, path: &str) -> Result<String>;

    /// Decode an integer value
    fn decode_int(&self, path: &str) -> Result<i64>;

    /// Decode a floating point value
    fn decode_float(&self, path: &str) -> Result<f64>;

    /// Return the raw node at `path` for structured decoding
    fn decode_node(&self, path: &str) -> Result<serde_yaml::Value>;

    /// Whether a value exists at `path`
    fn contains(&self, path: &str) -> bool {
        self.decode_node(path).is_ok()
    }

    /// Decode a structured record
    fn decode_record<T: DeserializeOwned>(&self, path: &str) -> Result<T>
    where
        Self: Sized,
    {
        let node = self.decode_node(path)?;
        serde_yaml::from_value(node)
            .map_err(|e| Error::config(format!("unable to decode config {}: {}", path, e)))
    }
}

/// YAML-backed configuration source
#[derive(Debug, Clone)]
pub struct YamlConfigSource {
    root: serde_yaml::Value,
}

impl YamlConfigSource {
    /// Parse a YAML document
    pub fn from_yaml(content: &str) -> Result<Self> {
        let root: serde_yaml::Value = serde_yaml::from_str(content)?;
        Ok(Self { root })
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "unable to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    fn lookup(&self, path: &str) -> Result<&serde_yaml::Value> {
        let mut node = &self.root;
        for segment in path.split('.') {
            node = node
                .get(segment)
                .ok_or_else(|| Error::config(format!("unable to find config: {}", path)))?;
        }
        if node.is_null() {
            return Err(Error::config(format!("unable to find config: {}", path)));
        }
        Ok(node)
    }
}

impl ConfigDecoder for YamlConfigSource {
    fn decode_string(&self, path: &str) -> Result<String> {
        self.lookup(path)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::config(format!("config {} is not a string", path)))
    }

    fn decode_int(&self, path: &str) -> Result<i64> {
        self.lookup(path)?
            .as_i64()
            .ok_or_else(|| Error::config(format!("config {} is not an integer", path)))
    }

    fn decode_float(&self, path: &str) -> Result<f64> {
        self.lookup(path)?
            .as_f64()
            .ok_or_else(|| Error::config(format!("config {} is not a number", path)))
    }

    fn decode_node(&self, path: &str) -> Result<serde_yaml::Value> {
        self.lookup(path).cloned()
    }
}

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Database location (file path or `:memory:`)
    pub database: String,

    /// Address resolver configuration
    pub resolver: ResolverConfig,

    /// Provider accounts and the zones they manage
    pub accounts: Vec<AccountConfig>,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl DdnsConfig {
    /// Assemble the configuration from a source and validate it
    pub fn load<D: ConfigDecoder>(source: &D) -> Result<Self> {
        let database = source.decode_string(DATABASE_PATH)?;
        let resolver: ResolverConfig = source.decode_record(RESOLVER_PATH)?;
        let accounts: Vec<AccountConfig> = source.decode_record(ACCOUNTS_PATH)?;

        let mut engine = EngineConfig {
            poll_interval_secs: resolver.check_period_mins.saturating_mul(60),
            ..EngineConfig::default()
        };
        if source.contains(EVENT_CHANNEL_CAPACITY_PATH) {
            let capacity = source.decode_int(EVENT_CHANNEL_CAPACITY_PATH)?;
            engine.event_channel_capacity = usize::try_from(capacity).map_err(|_| {
                Error::config(format!(
                    "{} must be positive, got {}",
                    EVENT_CHANNEL_CAPACITY_PATH, capacity
                ))
            })?;
        }

        let config = Self {
            database,
            resolver,
            accounts,
            engine,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::config("Database location cannot be empty"));
        }

        self.resolver.validate()?;
        self.engine.validate()?;

        if self.accounts.is_empty() {
            return Err(Error::config("No provider accounts configured"));
        }
        for account in &self.accounts {
            account.validate()?;
        }

        Ok(())
    }
}

/// Endpoint of an address family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// URL returning the bare address as the response body
    pub endpoint: String,
}

/// Address resolver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minutes between reconciliation cycles
    #[serde(rename = "check-period-mins")]
    pub check_period_mins: u64,

    /// IPv4 endpoint
    pub ipv4: EndpointConfig,

    /// IPv6 endpoint
    pub ipv6: EndpointConfig,
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<()> {
        if self.check_period_mins == 0 {
            return Err(Error::config("check-period-mins must be > 0"));
        }
        for (family, endpoint) in [("ipv4", &self.ipv4), ("ipv6", &self.ipv6)] {
            let url = endpoint.endpoint.as_str();
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(Error::config(format!(
                    "{} endpoint must use HTTP or HTTPS scheme. Got: {}",
                    family, url
                )));
            }
        }
        Ok(())
    }
}

/// A provider account and the zones it manages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account name (for logging)
    pub account: String,

    /// File holding the account's API credentials
    #[serde(rename = "credentials-file")]
    pub credentials_file: String,

    /// Zones managed through this account
    pub zones: Vec<ZoneConfig>,
}

impl AccountConfig {
    /// Validate the account configuration
    pub fn validate(&self) -> Result<()> {
        if self.account.is_empty() {
            return Err(Error::config("Account name cannot be empty"));
        }
        if self.credentials_file.is_empty() {
            return Err(Error::config(format!(
                "Account {} has no credentials-file",
                self.account
            )));
        }
        if self.zones.is_empty() {
            return Err(Error::config(format!(
                "Account {} has no zones configured",
                self.account
            )));
        }
        for zone in &self.zones {
            if zone.id.is_empty() {
                return Err(Error::config(format!(
                    "Account {} has a zone with an empty id",
                    self.account
                )));
            }
            if zone.records.is_empty() {
                return Err(Error::config(format!(
                    "Zone {} has no records configured",
                    zone.id
                )));
            }
        }
        Ok(())
    }
}

/// A provider zone and the records it is responsible for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Provider zone identifier
    pub id: String,

    /// Managed `(fqdn, type)` pairs, in configuration order
    pub records: Vec<RecordKey>,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between reconciliation cycles
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Error::config("Poll interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecordType;

    const FULL: &str = r#"
ddns:
  storage:
    sqlite:
      db: /var/simple-ddns.db
  public-ip-api:
    ipify:
      check-period-mins: 5
      parse-float: 2.5
      ipv4:
        endpoint: https://api.ipify.org
      ipv6:
        endpoint: https://api6.ipify.org
  dns-server:
    cloudflare:
      - account: home
        credentials-file: /etc/simpleddns/home.token
        zones:
          - id: "1111111111111111111111"
            records:
              - fqdn: www.example.com
                type: A
              - fqdn: www6.example.com
                type: AAAA
"#;

    #[test]
    fn test_typed_decoders() {
        let source = YamlConfigSource::from_yaml(FULL).unwrap();

        assert_eq!(
            source.decode_string(DATABASE_PATH).unwrap(),
            "/var/simple-ddns.db"
        );
        assert_eq!(
            source
                .decode_int("ddns.public-ip-api.ipify.check-period-mins")
                .unwrap(),
            5
        );
        assert_eq!(
            source
                .decode_float("ddns.public-ip-api.ipify.parse-float")
                .unwrap(),
            2.5
        );
        assert!(source.decode_int(DATABASE_PATH).is_err());
        assert!(source.decode_string("ddns.storage.postgres").is_err());
    }

    #[test]
    fn test_load_full_config() {
        let source = YamlConfigSource::from_yaml(FULL).unwrap();
        let config = DdnsConfig::load(&source).unwrap();

        assert_eq!(config.resolver.ipv4.endpoint, "https://api.ipify.org");
        assert_eq!(config.resolver.ipv6.endpoint, "https://api6.ipify.org");
        assert_eq!(config.engine.poll_interval_secs, 300);
        assert_eq!(config.engine.event_channel_capacity, 1000);

        let zone = &config.accounts[0].zones[0];
        assert_eq!(
            zone.records,
            vec![
                RecordKey::new("www.example.com", RecordType::A),
                RecordKey::new("www6.example.com", RecordType::Aaaa),
            ]
        );
    }

    #[test]
    fn test_missing_accounts_is_config_error() {
        let yaml = r#"
ddns:
  storage:
    sqlite:
      db: ":memory:"
  public-ip-api:
    ipify:
      check-period-mins: 1
      ipv4:
        endpoint: https://api.ipify.org
      ipv6:
        endpoint: https://api6.ipify.org
"#;
        let source = YamlConfigSource::from_yaml(yaml).unwrap();
        let err = DdnsConfig::load(&source).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_zone_without_records_rejected() {
        let account = AccountConfig {
            account: "home".to_string(),
            credentials_file: "/tmp/token".to_string(),
            zones: vec![ZoneConfig {
                id: "zone".to_string(),
                records: Vec::new(),
            }],
        };
        assert!(account.validate().is_err());
    }

    #[test]
    fn test_endpoint_scheme_validated() {
        let resolver = ResolverConfig {
            check_period_mins: 1,
            ipv4: EndpointConfig {
                endpoint: "ftp://api.ipify.org".to_string(),
            },
            ipv6: EndpointConfig {
                endpoint: "https://api6.ipify.org".to_string(),
            },
        };
        assert!(resolver.validate().is_err());
    }

    #[test]
    fn test_decoder_through_trait_object() {
        let source = YamlConfigSource::from_yaml(FULL).unwrap();
        let decoder: &dyn crate::traits::ConfigDecoder = &source;

        assert_eq!(
            decoder.decode_string(DATABASE_PATH).unwrap(),
            "/var/simple-ddns.db"
        );
        assert!(decoder.contains(ACCOUNTS_PATH));
        assert!(!decoder.contains("ddns.storage.postgres"));
    }
}
