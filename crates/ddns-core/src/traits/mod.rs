//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressResolver`]: Discover the current public addresses
//! - [`RecordStore`]: Versioned, transactional record persistence
//! - [`ZoneUpdater`]: Apply a batch of changes to one provider zone
//! - [`ConfigDecoder`]: Typed reads from a configuration source

pub mod address_resolver;
pub mod record_store;
pub mod zone_updater;

pub use address_resolver::AddressResolver;
pub use record_store::RecordStore;
pub use zone_updater::ZoneUpdater;

pub use crate::config::ConfigDecoder;
