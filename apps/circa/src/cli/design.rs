//! # Design Files
//!
//! JSON description of one complete project, loaded by `circa load`.
//!
//! Records reference each other by local string keys, never by store ids:
//!
//! ```json
//! {
//!   "project": "Chair",
//!   "materials": [
//!     { "key": "oak", "name": "Oak", "weight": 0.7, "co2_value": 1.1, "hardness": 3.8 }
//!   ],
//!   "nodes": [
//!     { "key": "chair", "material": "oak", "name": "Chair", "atomic": false },
//!     { "key": "leg", "material": "oak", "name": "Leg", "parent": "chair",
//!       "atomic": true, "weight": 1.5, "connection_type": "screw" }
//!   ],
//!   "relations": [ { "source": "leg", "target": "chair" } ]
//! }
//! ```
//!
//! The whole file is checked before the first write. Node levels follow from
//! the parent chain, so a parent must be listed before its children.

use crate::api::ConnectionTypeInput;
use circa_core::{
    CircaError, ConnectionType, MaterialId, NewMaterial, NewNode, NewRelation, NodeId, Project,
    Session, WeightPolicy,
    validation::{validate_atomic_weight, validate_material, validate_name},
};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of records (materials + nodes + relations) in one file.
pub const MAX_DESIGN_RECORDS: usize = 100_000;

// =============================================================================
// FILE SCHEMA
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignFile {
    pub project: String,
    #[serde(default)]
    pub materials: Vec<DesignMaterial>,
    #[serde(default)]
    pub nodes: Vec<DesignNode>,
    #[serde(default)]
    pub relations: Vec<DesignRelation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignMaterial {
    pub key: String,
    pub name: String,
    pub weight: f64,
    pub co2_value: f64,
    pub hardness: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignNode {
    pub key: String,
    pub material: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    pub atomic: bool,
    #[serde(default)]
    pub reusable: bool,
    #[serde(default)]
    pub connection_type: Option<ConnectionTypeInput>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub recyclable: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesignRelation {
    pub source: String,
    pub target: String,
}

/// What a load created.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub project: Project,
    pub materials: usize,
    pub nodes: usize,
    pub relations: usize,
}

// =============================================================================
// VALIDATION
// =============================================================================

fn invalid(message: String) -> CircaError {
    CircaError::InvalidInput(message)
}

impl DesignFile {
    /// Parse a design file from JSON bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self, CircaError> {
        serde_json::from_slice(bytes).map_err(|e| invalid(format!("Invalid design file: {}", e)))
    }

    /// Check the file without touching a store. Returns each node's level.
    pub fn validate(&self, policy: WeightPolicy) -> Result<Vec<u32>, CircaError> {
        let total = self.materials.len() + self.nodes.len() + self.relations.len();
        if total > MAX_DESIGN_RECORDS {
            return Err(invalid(format!(
                "Design has {} records, maximum is {}",
                total, MAX_DESIGN_RECORDS
            )));
        }

        validate_name("project", &self.project)?;

        let mut material_keys = BTreeSet::new();
        for material in &self.materials {
            validate_material(&material.to_new())?;
            if !material_keys.insert(material.key.as_str()) {
                return Err(invalid(format!("Duplicate material key '{}'", material.key)));
            }
        }

        let mut levels: BTreeMap<&str, u32> = BTreeMap::new();
        let mut ordered = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            validate_name("node", &node.name)?;
            if !material_keys.contains(node.material.as_str()) {
                return Err(invalid(format!(
                    "Node '{}' uses unknown material '{}'",
                    node.key, node.material
                )));
            }
            validate_atomic_weight(node.atomic, node.weight, policy)?;

            let level = match &node.parent {
                None => 0,
                Some(parent) => {
                    let parent_level = levels.get(parent.as_str()).ok_or_else(|| {
                        invalid(format!(
                            "Node '{}' names parent '{}', which is not listed before it",
                            node.key, parent
                        ))
                    })?;
                    parent_level + 1
                }
            };
            if levels.insert(node.key.as_str(), level).is_some() {
                return Err(invalid(format!("Duplicate node key '{}'", node.key)));
            }
            ordered.push(level);
        }

        for relation in &self.relations {
            for key in [&relation.source, &relation.target] {
                if !levels.contains_key(key.as_str()) {
                    return Err(invalid(format!("Relation names unknown node '{}'", key)));
                }
            }
        }

        Ok(ordered)
    }

    /// Validate, then create the project and every record in file order.
    pub fn apply(&self, session: &mut Session) -> Result<LoadSummary, CircaError> {
        let levels = self.validate(session.policy())?;

        let project = session.create_project(&self.project)?;

        let mut materials: BTreeMap<&str, MaterialId> = BTreeMap::new();
        for material in &self.materials {
            let created = session.create_material(material.to_new())?;
            materials.insert(material.key.as_str(), created.id);
        }

        let mut nodes: BTreeMap<&str, NodeId> = BTreeMap::new();
        for (node, level) in self.nodes.iter().zip(levels) {
            let parent_id = node
                .parent
                .as_deref()
                .and_then(|key| nodes.get(key).copied());
            let material_id = materials
                .get(node.material.as_str())
                .copied()
                .ok_or_else(|| invalid(format!("Unknown material '{}'", node.material)))?;
            let created = session.create_node(NewNode {
                project_id: project.id,
                material_id,
                name: node.name.clone(),
                parent_id,
                atomic: node.atomic,
                reusable: node.reusable,
                connection_type: node.connection_type.clone().map(ConnectionType::from),
                level,
                weight: node.weight,
                recyclable: node.recyclable,
            })?;
            nodes.insert(node.key.as_str(), created.id);
        }

        for relation in &self.relations {
            let (Some(source_id), Some(target_id)) = (
                nodes.get(relation.source.as_str()).copied(),
                nodes.get(relation.target.as_str()).copied(),
            ) else {
                return Err(invalid("Relation endpoint vanished during load".to_string()));
            };
            session.create_relation(NewRelation {
                project_id: project.id,
                source_id,
                target_id,
            })?;
        }

        Ok(LoadSummary {
            project,
            materials: self.materials.len(),
            nodes: self.nodes.len(),
            relations: self.relations.len(),
        })
    }
}

impl DesignMaterial {
    fn to_new(&self) -> NewMaterial {
        NewMaterial {
            name: self.name.clone(),
            weight: self.weight,
            co2_value: self.co2_value,
            hardness: self.hardness,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
