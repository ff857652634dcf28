// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::{MEMORY_LOCATION, SharedRecordStore, SqliteRecordStore};
