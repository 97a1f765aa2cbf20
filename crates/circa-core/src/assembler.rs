//! # Graph Assembler
//!
//! Orchestrates store reads into a project view and hosts the two
//! operations that write derived values back:
//!
//! - `assemble_graph`: read-only, composite weights are previewed
//! - `finalize`: persists composite weights in one batch
//! - `score`: persists sustainability scores in one batch
//!
//! A `CycleDetected` error aborts before anything is returned or written.

use crate::aggregator::{WeightAggregator, apply_weights};
use crate::scorer::{NodeScore, SustainabilityScorer};
use crate::store::NodeStore;
use crate::types::{
    CircaError, Material, Node, NodeId, ProjectId, RecordKind, Relation, RelationId,
};
use serde::{Deserialize, Serialize};

/// A relation as rendered in a graph view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: RelationId,
    pub source: NodeId,
    pub target: NodeId,
}

impl From<&Relation> for Edge {
    fn from(relation: &Relation) -> Self {
        Self {
            id: relation.id,
            source: relation.source_id,
            target: relation.target_id,
        }
    }
}

/// Unified view of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    /// Nodes ordered by id, composite weights previewed.
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Every material; materials are shared across projects.
    pub materials: Vec<Material>,
}

fn require_project<S: NodeStore + ?Sized>(
    store: &S,
    project: ProjectId,
) -> Result<(), CircaError> {
    match store.get_project(project)? {
        Some(_) => Ok(()),
        None => Err(CircaError::not_found(RecordKind::Project, project.0)),
    }
}

/// Project nodes, ordered by id, with composite weights previewed in memory.
fn previewed_nodes<S: NodeStore + ?Sized>(
    store: &S,
    project: ProjectId,
) -> Result<Vec<Node>, CircaError> {
    let mut nodes = store.get_nodes(project)?;
    nodes.sort_by_key(|n| n.id);
    let weights = WeightAggregator::new(&nodes).aggregate()?;
    apply_weights(&mut nodes, &weights);
    Ok(nodes)
}

/// Assemble `{nodes, edges, materials}` for a project.
///
/// # Errors
///
/// `NotFound` for an unknown project, `CycleDetected` if the tree loops.
pub fn assemble_graph<S: NodeStore + ?Sized>(
    store: &S,
    project: ProjectId,
) -> Result<GraphView, CircaError> {
    require_project(store, project)?;
    let nodes = previewed_nodes(store, project)?;
    let edges = store.get_relations(project)?.iter().map(Edge::from).collect();
    let materials = store.get_materials()?;

    Ok(GraphView {
        nodes,
        edges,
        materials,
    })
}

/// Compute and persist every composite weight of a project.
///
/// Returns all project nodes with their updated weights.
///
/// # Errors
///
/// `NotFound`, `CycleDetected`, or `Store`. On error no weight changes.
pub fn finalize<S: NodeStore + ?Sized>(
    store: &mut S,
    project: ProjectId,
) -> Result<Vec<Node>, CircaError> {
    require_project(store, project)?;
    let mut nodes = store.get_nodes(project)?;
    nodes.sort_by_key(|n| n.id);

    let weights = WeightAggregator::new(&nodes).aggregate()?;
    let updates: Vec<(NodeId, f64)> = weights.iter().map(|(id, w)| (*id, *w)).collect();
    if !updates.is_empty() {
        store.update_node_weights(&updates)?;
    }

    apply_weights(&mut nodes, &weights);
    Ok(nodes)
}

/// Score every node of a project and persist the scores.
///
/// Composite nodes are scored with their previewed weight.
///
/// # Errors
///
/// `NotFound`, `CycleDetected`, or `Store`. On error no score changes.
pub fn score<S: NodeStore + ?Sized>(
    store: &mut S,
    project: ProjectId,
) -> Result<Vec<NodeScore>, CircaError> {
    require_project(store, project)?;
    let nodes = previewed_nodes(store, project)?;
    let materials = store.get_materials()?;

    let scores = SustainabilityScorer::new(&materials).score_nodes(&nodes);
    let updates: Vec<(NodeId, f64)> = scores
        .iter()
        .map(|s| (s.id, s.sustainability_score))
        .collect();
    if !updates.is_empty() {
        store.update_node_scores(&updates)?;
    }

    Ok(scores)
}

// =============================================================================
// TESTS
// =============================================================================
