//! # Primitives
//!
//! Fixed constants of the Circa core.
//!
//! These are compiled into the binary and do not change at runtime.
//! The scoring factors in particular are part of the published formula:
//!
//! ```text
//! score = co2_value * weight * connection_factor * reuse_factor
//! ```

/// Connection factor for screwed joints.
pub const SCREW_FACTOR: f64 = 0.8;

/// Connection factor for bolted joints.
pub const BOLT_FACTOR: f64 = 1.0;

/// Connection factor for glued joints.
pub const GLUE_FACTOR: f64 = 1.2;

/// Factor for every other joining method, custom tags, and missing values.
pub const DEFAULT_CONNECTION_FACTOR: f64 = 1.0;

/// Reuse factor applied to reusable components.
pub const REUSABLE_FACTOR: f64 = 0.5;

/// Reuse factor applied to single-use components.
pub const SINGLE_USE_FACTOR: f64 = 1.0;

/// Project id that addresses every live scope at once.
pub const BROADCAST_PROJECT_ID: u64 = 0;

/// Maximum length of a project, material or node name in bytes.
pub const MAX_NAME_LENGTH: usize = 256;

/// Magic bytes for the Circa snapshot file header.
pub const MAGIC_BYTES: &[u8; 4] = b"CIRC";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;
