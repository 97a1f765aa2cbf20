//! # Storage Backends
//!
//! Disk-backed implementations of `NodeStore`.

mod redb_store;

pub use redb_store::RedbStore;
