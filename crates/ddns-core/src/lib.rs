// # ddns-core
//
// Core library for the DDNS reconciliation engine.
//
// ## Architecture Overview
//
// This library keeps a set of provider-hosted DNS records pointed at the
// host's current public addresses:
// - **AddressResolver**: Trait for discovering the public IPv4/IPv6 addresses
// - **RecordStore**: Trait for the versioned record store (one active row per key)
// - **ZoneUpdater**: Trait for submitting per-zone upsert batches to a provider
// - **ZoneRegistry**: Which zone manages which `(fqdn, record_type)` pairs
// - **DdnsEngine**: Runs the resolve → diff → persist → submit cycle
//
// ## Design Principles
//
// 1. **Core First**: Provider and resolver clients live in their own crates
// 2. **History Kept**: The store never deletes; a change supersedes the active row
// 3. **All Zones Attempted**: One zone failing never stops the others
// 4. **Library-First**: All core functionality can be used as a library

pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use batch::{build_batches, submit_batches, SubmitSummary};
pub use config::{AccountConfig, DdnsConfig, EngineConfig, ResolverConfig, YamlConfigSource};
pub use engine::{CycleReport, DdnsEngine, EngineEvent, ProviderAccount};
pub use error::{Error, Result};
pub use model::{DomainRecord, PublicAddress, RecordKey, RecordType, UpdateBatch};
pub use registry::{ZoneRegistry, ZoneSubscription};
pub use state::{MemoryRecordStore, SharedRecordStore, SqliteRecordStore};
pub use traits::{AddressResolver, RecordStore, ZoneUpdater};
