//! # Core Type Definitions
//!
//! This module contains all record types for the Circa design graph:
//! - Identifiers (`ProjectId`, `MaterialId`, `NodeId`, `RelationId`)
//! - Stored records (`Project`, `Material`, `Node`, `Relation`)
//! - Creation inputs (`NewMaterial`, `NewNode`, `NewRelation`)
//! - The joining method of a component (`ConnectionType`)
//! - Error types (`CircaError`)

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a design project.
///
/// `ProjectId(0)` is never allocated; it is the broadcast sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

/// Identifier of a material. Materials are shared across projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u64);

/// Identifier of a component node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Identifier of an auxiliary relation (edge) between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// CONNECTION TYPE
// =============================================================================

/// The closed set of joining methods with a numeric code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConnectionKind {
    Screw,
    Bolt,
    Glue,
    Weld,
    Nail,
    Clip,
}

impl ConnectionKind {
    /// All kinds, in code order.
    pub const ALL: [Self; 6] = [
        Self::Screw,
        Self::Bolt,
        Self::Glue,
        Self::Weld,
        Self::Nail,
        Self::Clip,
    ];

    /// Numeric code (SCREW=0 .. CLIP=5).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Screw => 0,
            Self::Bolt => 1,
            Self::Glue => 2,
            Self::Weld => 3,
            Self::Nail => 4,
            Self::Clip => 5,
        }
    }

    /// Look up a kind by its numeric code.
    #[must_use]
    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|k| u64::from(k.code()) == code)
    }

    /// Upper-case canonical name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Screw => "SCREW",
            Self::Bolt => "BOLT",
            Self::Glue => "GLUE",
            Self::Weld => "WELD",
            Self::Nail => "NAIL",
            Self::Clip => "CLIP",
        }
    }

    /// Case-insensitive name lookup.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a component is joined to the rest of the assembly.
///
/// Either a member of the closed [`ConnectionKind`] set or a free-form tag.
/// On the wire and on disk it is always a string: known kinds use their
/// upper-case name, custom tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ConnectionType {
    Known(ConnectionKind),
    Custom(String),
}

impl ConnectionType {
    /// Normalize a textual connection type.
    ///
    /// Accepts a case-insensitive kind name or a decimal kind code. Anything
    /// else becomes a custom tag.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if let Some(kind) = ConnectionKind::from_name(raw) {
            return Self::Known(kind);
        }
        if let Some(kind) = raw
            .trim()
            .parse::<u64>()
            .ok()
            .and_then(ConnectionKind::from_code)
        {
            return Self::Known(kind);
        }
        Self::Custom(raw.to_string())
    }

    /// Normalize a numeric connection code. Unknown codes become custom tags.
    #[must_use]
    pub fn from_code(code: u64) -> Self {
        ConnectionKind::from_code(code)
            .map(Self::Known)
            .unwrap_or_else(|| Self::Custom(code.to_string()))
    }

    /// The known kind, if this is not a custom tag.
    #[must_use]
    pub fn kind(&self) -> Option<ConnectionKind> {
        match self {
            Self::Known(kind) => Some(*kind),
            Self::Custom(_) => None,
        }
    }
}

impl From<ConnectionKind> for ConnectionType {
    fn from(kind: ConnectionKind) -> Self {
        Self::Known(kind)
    }
}

impl From<String> for ConnectionType {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ConnectionType> for String {
    fn from(value: ConnectionType) -> Self {
        match value {
            ConnectionType::Known(kind) => kind.name().to_string(),
            ConnectionType::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(kind) => f.write_str(kind.name()),
            Self::Custom(tag) => f.write_str(tag),
        }
    }
}

// =============================================================================
// RECORDS
// =============================================================================

/// A design project. Owns nodes and relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

/// A material with its physical and environmental attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    pub weight: f64,
    pub co2_value: f64,
    pub hardness: f64,
}

/// Input for creating a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub name: String,
    pub weight: f64,
    pub co2_value: f64,
    pub hardness: f64,
}

impl NewMaterial {
    /// Attach an id, producing the stored record.
    #[must_use]
    pub fn into_material(self, id: MaterialId) -> Material {
        Material {
            id,
            name: self.name,
            weight: self.weight,
            co2_value: self.co2_value,
            hardness: self.hardness,
        }
    }
}

/// A component in a project's tree.
///
/// Atomic nodes carry an authoritative weight. Composite nodes get theirs
/// from their children (see `aggregator`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub project_id: ProjectId,
    pub material_id: MaterialId,
    pub name: String,
    pub parent_id: Option<NodeId>,
    pub atomic: bool,
    pub reusable: bool,
    pub connection_type: Option<ConnectionType>,
    pub level: u32,
    pub weight: Option<f64>,
    pub recyclable: bool,
    pub sustainability_score: Option<f64>,
}

/// Input for creating a node. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub project_id: ProjectId,
    pub material_id: MaterialId,
    pub name: String,
    pub parent_id: Option<NodeId>,
    pub atomic: bool,
    pub reusable: bool,
    pub connection_type: Option<ConnectionType>,
    pub level: u32,
    pub weight: Option<f64>,
    pub recyclable: bool,
}

impl NewNode {
    /// Attach an id, producing the stored record. The score starts unset.
    #[must_use]
    pub fn into_node(self, id: NodeId) -> Node {
        Node {
            id,
            project_id: self.project_id,
            material_id: self.material_id,
            name: self.name,
            parent_id: self.parent_id,
            atomic: self.atomic,
            reusable: self.reusable,
            connection_type: self.connection_type,
            level: self.level,
            weight: self.weight,
            recyclable: self.recyclable,
            sustainability_score: None,
        }
    }
}

/// An auxiliary directed link between two nodes of one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub project_id: ProjectId,
    pub source_id: NodeId,
    pub target_id: NodeId,
}

/// Input for creating a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRelation {
    pub project_id: ProjectId,
    pub source_id: NodeId,
    pub target_id: NodeId,
}

impl NewRelation {
    #[must_use]
    pub fn into_relation(self, id: RelationId) -> Relation {
        Relation {
            id,
            project_id: self.project_id,
            source_id: self.source_id,
            target_id: self.target_id,
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Kind of record named by a `NotFound` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Project,
    Material,
    Node,
    Relation,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Project => "project",
            Self::Material => "material",
            Self::Node => "node",
            Self::Relation => "relation",
        })
    }
}

/// Errors that can occur in the Circa core.
///
/// - No silent failures
/// - Validation variants are raised before any write
/// - `Store` carries backend detail that must not reach end users
#[derive(Debug, Error)]
pub enum CircaError {
    /// The referenced parent is absent or belongs to another project.
    #[error("parent node {parent} not found in project {project}")]
    ParentNotFound { parent: NodeId, project: ProjectId },

    /// Level and parent disagree.
    #[error("invalid level: {0}")]
    InvalidLevel(String),

    /// Weight is missing, non-positive, or supplied where it must be derived.
    #[error("invalid weight: {0}")]
    InvalidWeight(String),

    /// A field failed basic validation (empty name, non-positive material value, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The aggregation traversal revisited a node on its active path.
    #[error("cycle detected at node {0}")]
    CycleDetected(NodeId),

    /// A direct lookup found nothing.
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    /// The underlying store failed or is unavailable.
    #[error("store error: {0}")]
    Store(String),

    /// File or network I/O outside the store failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl CircaError {
    /// Stable machine-readable category.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::ParentNotFound { .. } => "parent_not_found",
            Self::InvalidLevel(_) => "invalid_level",
            Self::InvalidWeight(_) => "invalid_weight",
            Self::InvalidInput(_) => "invalid_input",
            Self::CycleDetected(_) => "cycle_detected",
            Self::NotFound { .. } => "not_found",
            Self::Store(_) => "store_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Whether the caller supplied something wrong (as opposed to a store or I/O fault).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_) | Self::Io(_))
    }

    pub fn not_found(kind: RecordKind, id: u64) -> Self {
        Self::NotFound { kind, id }
    }
}

/// Convert any backend error into `CircaError::Store`.
pub(crate) fn store_err<E: fmt::Display>(e: E) -> CircaError {
    CircaError::Store(e.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
