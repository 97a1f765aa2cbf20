//! # Sustainability Scorer
//!
//! Computes the environmental impact score of a node:
//!
//! ```text
//! score = co2_value * weight * connection_factor * reuse_factor
//! ```
//!
//! Lower is better. The formula is total: unknown connection types fall
//! back to the default factor, and a missing material or weight scores 0.0.

use crate::primitives::{
    BOLT_FACTOR, DEFAULT_CONNECTION_FACTOR, GLUE_FACTOR, REUSABLE_FACTOR, SCREW_FACTOR,
    SINGLE_USE_FACTOR,
};
use crate::types::{ConnectionKind, ConnectionType, Material, MaterialId, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multiplier for the joining method.
#[must_use]
pub fn connection_factor(connection: Option<&ConnectionType>) -> f64 {
    match connection.and_then(ConnectionType::kind) {
        Some(ConnectionKind::Screw) => SCREW_FACTOR,
        Some(ConnectionKind::Bolt) => BOLT_FACTOR,
        Some(ConnectionKind::Glue) => GLUE_FACTOR,
        _ => DEFAULT_CONNECTION_FACTOR,
    }
}

/// Multiplier for reusability.
#[must_use]
pub const fn reuse_factor(reusable: bool) -> f64 {
    if reusable {
        REUSABLE_FACTOR
    } else {
        SINGLE_USE_FACTOR
    }
}

/// Apply the scoring formula. Missing inputs count as 0.0.
#[must_use]
pub fn sustainability_score(
    co2_value: Option<f64>,
    weight: Option<f64>,
    connection: Option<&ConnectionType>,
    reusable: bool,
) -> f64 {
    co2_value.unwrap_or(0.0)
        * weight.unwrap_or(0.0)
        * connection_factor(connection)
        * reuse_factor(reusable)
}

/// Score of one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeScore {
    pub id: NodeId,
    pub sustainability_score: f64,
}

/// Scores nodes against a fixed material table.
#[derive(Debug)]
pub struct SustainabilityScorer<'a> {
    materials: BTreeMap<MaterialId, &'a Material>,
}

impl<'a> SustainabilityScorer<'a> {
    #[must_use]
    pub fn new(materials: &'a [Material]) -> Self {
        Self {
            materials: materials.iter().map(|m| (m.id, m)).collect(),
        }
    }

    /// Score a single node using its current `weight`.
    #[must_use]
    pub fn score_node(&self, node: &Node) -> f64 {
        let co2 = self.materials.get(&node.material_id).map(|m| m.co2_value);
        sustainability_score(co2, node.weight, node.connection_type.as_ref(), node.reusable)
    }

    /// Score every node, in input order.
    #[must_use]
    pub fn score_nodes(&self, nodes: &[Node]) -> Vec<NodeScore> {
        nodes
            .iter()
            .map(|node| NodeScore {
                id: node.id,
                sustainability_score: self.score_node(node),
            })
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
