//! # Validation Module
//!
//! Creation-time checks for Circa records.
//!
//! - Every check runs before any write
//! - Reject malformed input with a specific `CircaError` variant
//! - Never repair input silently, except the composite weight policy and
//!   blank connection tags, which mean "no connection"

use crate::primitives::MAX_NAME_LENGTH;
use crate::store::NodeStore;
use crate::types::{
    CircaError, ConnectionType, NewMaterial, NewNode, NewRelation, NodeId, ProjectId, RecordKind,
};
use serde::{Deserialize, Serialize};

/// How a weight supplied for a composite node is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightPolicy {
    /// Discard the supplied weight; it is derived from the children.
    #[default]
    Lenient,
    /// Reject the node with `InvalidWeight`.
    Strict,
}

/// Check a record name: non-empty after trimming and at most `MAX_NAME_LENGTH` bytes.
pub fn validate_name(what: &str, name: &str) -> Result<(), CircaError> {
    if name.trim().is_empty() {
        return Err(CircaError::InvalidInput(format!("{what} name must not be empty")));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(CircaError::InvalidInput(format!(
            "{what} name exceeds {MAX_NAME_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Check that level and parent agree.
///
/// A root sits at level 0 and has no parent. Any deeper node has one.
pub fn validate_level(level: u32, parent: Option<NodeId>) -> Result<(), CircaError> {
    match (level, parent) {
        (0, Some(parent)) => Err(CircaError::InvalidLevel(format!(
            "level 0 node cannot have parent {parent}"
        ))),
        (level, None) if level > 0 => Err(CircaError::InvalidLevel(format!(
            "level {level} node requires a parent"
        ))),
        _ => Ok(()),
    }
}

/// Check that `parent` exists in `project` and sits exactly one level above `level`.
pub fn validate_parent<S: NodeStore + ?Sized>(
    store: &S,
    parent: NodeId,
    project: ProjectId,
    level: u32,
) -> Result<(), CircaError> {
    let parent_level = store
        .get_parent_level(parent, project)?
        .ok_or(CircaError::ParentNotFound { parent, project })?;

    if parent_level.checked_add(1) != Some(level) {
        return Err(CircaError::InvalidLevel(format!(
            "level {level} does not follow parent level {parent_level}"
        )));
    }
    Ok(())
}

/// Check the weight of a new node and return the weight to store.
///
/// Atomic nodes need a finite weight above zero. Composite nodes get their
/// weight from aggregation, so a supplied one is dropped or rejected per `policy`.
pub fn validate_atomic_weight(
    atomic: bool,
    weight: Option<f64>,
    policy: WeightPolicy,
) -> Result<Option<f64>, CircaError> {
    if atomic {
        return match weight {
            Some(w) if w.is_finite() && w > 0.0 => Ok(Some(w)),
            Some(w) => Err(CircaError::InvalidWeight(format!(
                "atomic weight must be positive, got {w}"
            ))),
            None => Err(CircaError::InvalidWeight(
                "atomic node requires a weight".to_string(),
            )),
        };
    }

    match (weight, policy) {
        (Some(w), WeightPolicy::Strict) => Err(CircaError::InvalidWeight(format!(
            "composite node weight is derived, got {w}"
        ))),
        _ => Ok(None),
    }
}

/// Check the attributes of a new material.
pub fn validate_material(material: &NewMaterial) -> Result<(), CircaError> {
    validate_name("material", &material.name)?;

    for (field, value) in [
        ("weight", material.weight),
        ("co2_value", material.co2_value),
        ("hardness", material.hardness),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(CircaError::InvalidInput(format!(
                "material {field} must be positive, got {value}"
            )));
        }
    }
    Ok(())
}

/// A blank custom tag means no connection. Every other tag is kept verbatim.
fn normalize_connection(connection: Option<ConnectionType>) -> Option<ConnectionType> {
    match connection {
        Some(ConnectionType::Custom(tag)) if tag.trim().is_empty() => None,
        other => other,
    }
}

/// Run every node check against `store` and normalize the node for insertion.
///
/// On success the returned node carries the weight to store. Nothing is written.
pub fn validate_new_node<S: NodeStore + ?Sized>(
    store: &S,
    mut node: NewNode,
    policy: WeightPolicy,
) -> Result<NewNode, CircaError> {
    validate_name("node", &node.name)?;
    node.connection_type = normalize_connection(node.connection_type.take());

    if store.get_project(node.project_id)?.is_none() {
        return Err(CircaError::not_found(RecordKind::Project, node.project_id.0));
    }
    if store.get_material(node.material_id)?.is_none() {
        return Err(CircaError::not_found(
            RecordKind::Material,
            node.material_id.0,
        ));
    }

    validate_level(node.level, node.parent_id)?;
    if let Some(parent) = node.parent_id {
        validate_parent(store, parent, node.project_id, node.level)?;
    }

    node.weight = validate_atomic_weight(node.atomic, node.weight, policy)?;
    Ok(node)
}

/// Check that both endpoints of a relation exist inside its project.
pub fn validate_relation<S: NodeStore + ?Sized>(
    store: &S,
    relation: &NewRelation,
) -> Result<(), CircaError> {
    if store.get_project(relation.project_id)?.is_none() {
        return Err(CircaError::not_found(
            RecordKind::Project,
            relation.project_id.0,
        ));
    }
    for endpoint in [relation.source_id, relation.target_id] {
        let in_project = store
            .get_node(endpoint)?
            .is_some_and(|n| n.project_id == relation.project_id);
        if !in_project {
            return Err(CircaError::not_found(RecordKind::Node, endpoint.0));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
