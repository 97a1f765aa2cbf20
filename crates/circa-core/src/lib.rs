//! # circa-core
//!
//! The graph aggregation and sustainability-scoring engine for Circa - THE LOGIC.
//!
//! A design project is a tree of physical components ("nodes"). Each node is
//! made from a material, is joined to its parent in some way, and receives a
//! score for its environmental impact. This crate:
//! - assembles a project's nodes, edges and materials into one view
//! - derives composite weights from their children, rejecting cycles
//! - scores every node with a fixed formula
//!
//! ## Architectural Constraints
//!
//! - Synchronous, NO async, NO network dependencies
//! - Storage is reached only through the `NodeStore` trait
//! - Live updates leave only through the `NotificationSink` trait
//! - `BTreeMap` everywhere, so every listing is ordered by id

// =============================================================================
// MODULES
// =============================================================================

pub mod aggregator;
pub mod assembler;
pub mod events;
pub mod formats;
pub mod primitives;
pub mod scorer;
pub mod session;
pub mod storage;
pub mod store;
pub mod types;
pub mod validation;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CircaError, ConnectionKind, ConnectionType, Material, MaterialId, NewMaterial, NewNode,
    NewRelation, Node, NodeId, Project, ProjectId, RecordKind, Relation, RelationId,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use aggregator::{WeightAggregator, apply_weights};
pub use assembler::{Edge, GraphView, assemble_graph, finalize, score};
pub use events::{ChangeEvent, NotificationSink, NullSink, RecordingSink, Scope};
pub use scorer::{NodeScore, SustainabilityScorer, connection_factor, reuse_factor};
pub use session::{Session, StorageBackend};
pub use storage::RedbStore;
pub use store::{IdSequences, MemoryStore, NodeStore, StoreStats};
pub use validation::WeightPolicy;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, store_from_bytes, store_to_bytes};
