//! # Formats
//!
//! On-disk encodings owned by the core. File I/O stays in the app layer.

pub mod persistence;

pub use persistence::{
    HEADER_SIZE, MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, store_from_bytes,
    store_to_bytes,
};
