//! # Snapshot Format
//!
//! Binary serialization for `MemoryStore` snapshots.
//!
//! File I/O operations are in the app layer.
//!
//! Format: Header (5 bytes) + postcard-serialized store data.
//! - 4 bytes: Magic ("CIRC")
//! - 1 byte: Version
//!
//! ## Limits
//!
//! Input is validated before deserialization:
//! - Maximum payload size (`MAX_PERSISTENCE_PAYLOAD_SIZE`)
//! - Header magic and version
//! - Corrupted payloads are reported, never panicked on

use crate::primitives;
use crate::store::MemoryStore;
use crate::types::CircaError;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum allowed snapshot size in bytes.
///
/// Checked BEFORE attempting deserialization.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Size of the fixed header.
pub const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes all snapshot data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate magic bytes and version.
    pub fn validate(&self) -> Result<(), CircaError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(CircaError::Store("invalid snapshot magic bytes".to_string()));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(CircaError::Store(format!(
                "unsupported snapshot version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CircaError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(CircaError::Store("snapshot header too short".to_string()));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a store to bytes (header + payload).
pub fn store_to_bytes(store: &MemoryStore) -> Result<Vec<u8>, CircaError> {
    let header = PersistenceHeader::new();
    let payload = postcard::to_stdvec(store)
        .map_err(|e| CircaError::Store(format!("failed to serialize snapshot: {e}")))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a store from bytes.
///
/// Size and header are validated before the payload is decoded.
pub fn store_from_bytes(bytes: &[u8]) -> Result<MemoryStore, CircaError> {
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(CircaError::Store(format!(
            "snapshot size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[HEADER_SIZE..];
    postcard::from_bytes(payload)
        .map_err(|e| CircaError::Store(format!("failed to deserialize snapshot: {e}")))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NodeStore;
    use crate::types::{ConnectionType, NewMaterial, NewNode};

    fn populated() -> MemoryStore {
        let mut store = MemoryStore::new();
        let project = store.create_project("lamp").expect("project");
        let material = store
            .create_material(NewMaterial {
                name: "aluminium".to_string(),
                weight: 2.7,
                co2_value: 8.1,
                hardness: 2.75,
            })
            .expect("material");
        store
            .create_node(NewNode {
                project_id: project.id,
                material_id: material.id,
                name: "shade".to_string(),
                parent_id: None,
                atomic: true,
                reusable: true,
                connection_type: Some(ConnectionType::Custom("press-fit".to_string())),
                level: 0,
                weight: Some(0.4),
                recyclable: true,
            })
            .expect("node");
        store
    }

    #[test]
    fn header_layout() {
        let bytes = PersistenceHeader::new().to_bytes();
        assert_eq!(&bytes[0..4], b"CIRC");
        assert_eq!(bytes[4], primitives::FORMAT_VERSION);
    }

    #[test]
    fn snapshot_restores_records_and_sequences() {
        let store = populated();
        let bytes = store_to_bytes(&store).expect("serialize");
        let mut restored = store_from_bytes(&bytes).expect("deserialize");

        assert_eq!(restored, store);
        let next = restored.create_project("desk").expect("project");
        assert_eq!(next.id.0, 2);
    }

    #[test]
    fn save_load_save_is_bit_exact() {
        let bytes1 = store_to_bytes(&populated()).expect("first serialize");
        let restored = store_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = store_to_bytes(&restored).expect("second serialize");
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(store_from_bytes(&bytes).is_err());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut bytes = store_to_bytes(&populated()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION.wrapping_add(1);
        assert!(matches!(store_from_bytes(&bytes), Err(CircaError::Store(_))));
    }

    #[test]
    fn truncated_input_rejected() {
        assert!(store_from_bytes(b"CIR").is_err());
        let bytes = store_to_bytes(&populated()).expect("serialize");
        assert!(store_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
