//! # Node Store
//!
//! The storage boundary of the Circa core.
//!
//! `NodeStore` is the only way the core reaches persisted records. The
//! aggregator and scorer never see it; the assembler and session are
//! generic over it. Two implementations exist:
//! - `MemoryStore` (this module): `BTreeMap`-backed, snapshot-able
//! - `RedbStore` (`storage` module): disk-backed, ACID
//!
//! Stores do not validate domain rules (levels, weights). They only keep
//! their own records consistent: batched updates are all-or-nothing and
//! deleting a node removes every relation that touches it.

use crate::types::{
    CircaError, Material, MaterialId, NewMaterial, NewNode, NewRelation, Node, NodeId, Project,
    ProjectId, RecordKind, Relation, RelationId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// NODESTORE TRAIT
// =============================================================================

/// Record counts, used for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub projects: usize,
    pub materials: usize,
    pub nodes: usize,
    pub relations: usize,
}

/// Storage operations consumed by the core.
///
/// All fallible operations return `Result<T, CircaError>`; backend faults
/// surface as `CircaError::Store`. Lookups return `Ok(None)` for absent
/// records and leave the `NotFound` decision to the caller.
pub trait NodeStore {
    // --- projects ---

    /// Create a project and assign its id.
    fn create_project(&mut self, name: &str) -> Result<Project, CircaError>;

    /// Lookup a project by id.
    fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CircaError>;

    /// All projects, ordered by id.
    fn projects(&self) -> Result<Vec<Project>, CircaError>;

    // --- materials ---

    /// Create a material and assign its id.
    fn create_material(&mut self, material: NewMaterial) -> Result<Material, CircaError>;

    /// Lookup a material by id.
    fn get_material(&self, id: MaterialId) -> Result<Option<Material>, CircaError>;

    /// All materials, ordered by id. Materials are not scoped to a project.
    fn get_materials(&self) -> Result<Vec<Material>, CircaError>;

    /// Delete a material. Returns the removed record, if any.
    fn delete_material(&mut self, id: MaterialId) -> Result<Option<Material>, CircaError>;

    // --- nodes ---

    /// Insert a node and assign its id.
    fn create_node(&mut self, node: NewNode) -> Result<Node, CircaError>;

    /// Lookup a node by id.
    fn get_node(&self, id: NodeId) -> Result<Option<Node>, CircaError>;

    /// All nodes of a project, ordered by id.
    fn get_nodes(&self, project: ProjectId) -> Result<Vec<Node>, CircaError>;

    /// Level of `parent` if it exists inside `project`.
    fn get_parent_level(
        &self,
        parent: NodeId,
        project: ProjectId,
    ) -> Result<Option<u32>, CircaError> {
        Ok(self
            .get_node(parent)?
            .filter(|n| n.project_id == project)
            .map(|n| n.level))
    }

    /// Delete a node and every relation that references it, atomically.
    /// Returns the removed node, if any.
    fn delete_node(&mut self, id: NodeId) -> Result<Option<Node>, CircaError>;

    /// Overwrite the stored weight of several nodes in one transaction.
    ///
    /// Fails with `NotFound` (and writes nothing) if any id is unknown.
    fn update_node_weights(&mut self, updates: &[(NodeId, f64)]) -> Result<(), CircaError>;

    /// Overwrite the stored sustainability score of several nodes in one transaction.
    ///
    /// Fails with `NotFound` (and writes nothing) if any id is unknown.
    fn update_node_scores(&mut self, updates: &[(NodeId, f64)]) -> Result<(), CircaError>;

    // --- relations ---

    /// Insert a relation and assign its id.
    fn create_relation(&mut self, relation: NewRelation) -> Result<Relation, CircaError>;

    /// Lookup a relation by id.
    fn get_relation(&self, id: RelationId) -> Result<Option<Relation>, CircaError>;

    /// All relations of a project, ordered by id.
    fn get_relations(&self, project: ProjectId) -> Result<Vec<Relation>, CircaError>;

    /// Delete a relation. Returns the removed record, if any.
    fn delete_relation(&mut self, id: RelationId) -> Result<Option<Relation>, CircaError>;

    // --- reporting ---

    /// Count every record kind.
    fn stats(&self) -> Result<StoreStats, CircaError>;
}

// =============================================================================
// ID SEQUENCES
// =============================================================================

/// Last allocated id per record kind. Ids start at 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSequences {
    pub project: u64,
    pub material: u64,
    pub node: u64,
    pub relation: u64,
}

impl IdSequences {
    /// Advance a counter and return the new id.
    pub fn advance(counter: &mut u64) -> u64 {
        *counter = counter.saturating_add(1);
        *counter
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// In-memory store.
///
/// Uses `BTreeMap` exclusively so every listing is ordered by id.
/// Serializable as a whole for the snapshot file backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    projects: BTreeMap<ProjectId, Project>,
    materials: BTreeMap<MaterialId, Material>,
    nodes: BTreeMap<NodeId, Node>,
    relations: BTreeMap<RelationId, Relation>,
    sequences: IdSequences,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last allocated ids.
    #[must_use]
    pub fn sequences(&self) -> IdSequences {
        self.sequences
    }

    /// Check every id of a batch before anything is written.
    fn check_batch(&self, updates: &[(NodeId, f64)]) -> Result<(), CircaError> {
        match updates.iter().find(|(id, _)| !self.nodes.contains_key(id)) {
            Some((missing, _)) => Err(CircaError::not_found(RecordKind::Node, missing.0)),
            None => Ok(()),
        }
    }
}

impl NodeStore for MemoryStore {
    fn create_project(&mut self, name: &str) -> Result<Project, CircaError> {
        let id = ProjectId(IdSequences::advance(&mut self.sequences.project));
        let project = Project {
            id,
            name: name.to_string(),
        };
        self.projects.insert(id, project.clone());
        Ok(project)
    }

    fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CircaError> {
        Ok(self.projects.get(&id).cloned())
    }

    fn projects(&self) -> Result<Vec<Project>, CircaError> {
        Ok(self.projects.values().cloned().collect())
    }

    fn create_material(&mut self, material: NewMaterial) -> Result<Material, CircaError> {
        let id = MaterialId(IdSequences::advance(&mut self.sequences.material));
        let material = material.into_material(id);
        self.materials.insert(id, material.clone());
        Ok(material)
    }

    fn get_material(&self, id: MaterialId) -> Result<Option<Material>, CircaError> {
        Ok(self.materials.get(&id).cloned())
    }

    fn get_materials(&self) -> Result<Vec<Material>, CircaError> {
        Ok(self.materials.values().cloned().collect())
    }

    fn delete_material(&mut self, id: MaterialId) -> Result<Option<Material>, CircaError> {
        Ok(self.materials.remove(&id))
    }

    fn create_node(&mut self, node: NewNode) -> Result<Node, CircaError> {
        let id = NodeId(IdSequences::advance(&mut self.sequences.node));
        let node = node.into_node(id);
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<Node>, CircaError> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn get_nodes(&self, project: ProjectId) -> Result<Vec<Node>, CircaError> {
        Ok(self
            .nodes
            .values()
            .filter(|n| n.project_id == project)
            .cloned()
            .collect())
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Option<Node>, CircaError> {
        let removed = self.nodes.remove(&id);
        if removed.is_some() {
            self.relations
                .retain(|_, r| r.source_id != id && r.target_id != id);
        }
        Ok(removed)
    }

    fn update_node_weights(&mut self, updates: &[(NodeId, f64)]) -> Result<(), CircaError> {
        self.check_batch(updates)?;
        for (id, weight) in updates {
            if let Some(node) = self.nodes.get_mut(id) {
                node.weight = Some(*weight);
            }
        }
        Ok(())
    }

    fn update_node_scores(&mut self, updates: &[(NodeId, f64)]) -> Result<(), CircaError> {
        self.check_batch(updates)?;
        for (id, score) in updates {
            if let Some(node) = self.nodes.get_mut(id) {
                node.sustainability_score = Some(*score);
            }
        }
        Ok(())
    }

    fn create_relation(&mut self, relation: NewRelation) -> Result<Relation, CircaError> {
        let id = RelationId(IdSequences::advance(&mut self.sequences.relation));
        let relation = relation.into_relation(id);
        self.relations.insert(id, relation.clone());
        Ok(relation)
    }

    fn get_relation(&self, id: RelationId) -> Result<Option<Relation>, CircaError> {
        Ok(self.relations.get(&id).cloned())
    }

    fn get_relations(&self, project: ProjectId) -> Result<Vec<Relation>, CircaError> {
        Ok(self
            .relations
            .values()
            .filter(|r| r.project_id == project)
            .cloned()
            .collect())
    }

    fn delete_relation(&mut self, id: RelationId) -> Result<Option<Relation>, CircaError> {
        Ok(self.relations.remove(&id))
    }

    fn stats(&self) -> Result<StoreStats, CircaError> {
        Ok(StoreStats {
            projects: self.projects.len(),
            materials: self.materials.len(),
            nodes: self.nodes.len(),
            relations: self.relations.len(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
