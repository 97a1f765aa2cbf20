//! # redb-backed Node Store
//!
//! A disk-backed `NodeStore` using the redb embedded database.
//!
//! redb provides:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//! - Zero configuration
//!
//! ## Layout
//!
//! Records are postcard-encoded and keyed by their numeric id. Two index
//! tables keyed by `(project, id)` make per-project listings a range scan.
//! Id sequences live in the metadata table.
//!
//! Every mutating method opens exactly one write transaction. Dropping a
//! transaction without committing aborts it, so an early `?` return
//! leaves the database untouched.

use crate::store::{NodeStore, StoreStats};
use crate::types::{
    CircaError, Material, MaterialId, NewMaterial, NewNode, NewRelation, Node, NodeId, Project,
    ProjectId, RecordKind, Relation, RelationId, store_err,
};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

type RecordTable = TableDefinition<'static, u64, &'static [u8]>;
type IndexTable = TableDefinition<'static, (u64, u64), ()>;

/// Table for projects: ProjectId(u64) -> serialized Project bytes
const PROJECTS: RecordTable = TableDefinition::new("projects");

/// Table for materials: MaterialId(u64) -> serialized Material bytes
const MATERIALS: RecordTable = TableDefinition::new("materials");

/// Table for nodes: NodeId(u64) -> serialized Node bytes
const NODES: RecordTable = TableDefinition::new("nodes");

/// Table for relations: RelationId(u64) -> serialized Relation bytes
const RELATIONS: RecordTable = TableDefinition::new("relations");

/// Index: (project_id, node_id) -> ()
const PROJECT_NODES: IndexTable = TableDefinition::new("project_nodes");

/// Index: (project_id, relation_id) -> ()
const PROJECT_RELATIONS: IndexTable = TableDefinition::new("project_relations");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const SEQ_PROJECT: &str = "last_project_id";
const SEQ_MATERIAL: &str = "last_material_id";
const SEQ_NODE: &str = "last_node_id";
const SEQ_RELATION: &str = "last_relation_id";

/// A disk-backed node store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

// =============================================================================
// ENCODING HELPERS
// =============================================================================

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CircaError> {
    postcard::to_allocvec(value).map_err(store_err)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CircaError> {
    postcard::from_bytes(bytes).map_err(store_err)
}

// =============================================================================
// WRITE-TRANSACTION HELPERS
// =============================================================================

/// Allocate the next id of a sequence inside `txn`.
fn next_id(txn: &WriteTransaction, key: &str) -> Result<u64, CircaError> {
    let mut meta = txn.open_table(METADATA).map_err(store_err)?;
    let current = meta
        .get(key)
        .map_err(store_err)?
        .map(|v| v.value())
        .unwrap_or(0);
    let next = current.saturating_add(1);
    meta.insert(key, next).map_err(store_err)?;
    Ok(next)
}

fn put_record<T: Serialize>(
    txn: &WriteTransaction,
    table: RecordTable,
    id: u64,
    value: &T,
) -> Result<(), CircaError> {
    let bytes = encode(value)?;
    let mut table = txn.open_table(table).map_err(store_err)?;
    table.insert(id, bytes.as_slice()).map_err(store_err)?;
    Ok(())
}

fn get_record_in<T: DeserializeOwned>(
    txn: &WriteTransaction,
    table: RecordTable,
    id: u64,
) -> Result<Option<T>, CircaError> {
    let table = txn.open_table(table).map_err(store_err)?;
    let record = match table.get(id).map_err(store_err)? {
        Some(data) => Some(decode(data.value())?),
        None => None,
    };
    Ok(record)
}

fn take_record<T: DeserializeOwned>(
    txn: &WriteTransaction,
    table: RecordTable,
    id: u64,
) -> Result<Option<T>, CircaError> {
    let mut table = txn.open_table(table).map_err(store_err)?;
    let removed = table.remove(id).map_err(store_err)?;
    let record = match removed {
        Some(data) => Some(decode(data.value())?),
        None => None,
    };
    Ok(record)
}

fn put_index(
    txn: &WriteTransaction,
    index: IndexTable,
    key: (u64, u64),
) -> Result<(), CircaError> {
    let mut table = txn.open_table(index).map_err(store_err)?;
    table.insert(key, ()).map_err(store_err)?;
    Ok(())
}

fn drop_index(
    txn: &WriteTransaction,
    index: IndexTable,
    key: (u64, u64),
) -> Result<(), CircaError> {
    let mut table = txn.open_table(index).map_err(store_err)?;
    table.remove(key).map_err(store_err)?;
    Ok(())
}

/// Ids listed under `project` in an index table.
fn index_ids(
    txn: &WriteTransaction,
    index: IndexTable,
    project: u64,
) -> Result<Vec<u64>, CircaError> {
    let table = txn.open_table(index).map_err(store_err)?;
    let mut ids = Vec::new();
    for entry in table
        .range((project, 0u64)..=(project, u64::MAX))
        .map_err(store_err)?
    {
        let (key, _) = entry.map_err(store_err)?;
        ids.push(key.value().1);
    }
    Ok(ids)
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CircaError> {
        let db = Database::create(path.as_ref()).map_err(store_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(store_err)?;
            for table in [PROJECTS, MATERIALS, NODES, RELATIONS] {
                let _ = write_txn.open_table(table).map_err(store_err)?;
            }
            for index in [PROJECT_NODES, PROJECT_RELATIONS] {
                let _ = write_txn.open_table(index).map_err(store_err)?;
            }
            let _ = write_txn.open_table(METADATA).map_err(store_err)?;
            write_txn.commit().map_err(store_err)?;
        }

        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<(), CircaError> {
        self.db.compact().map_err(store_err)?;
        Ok(())
    }

    fn read_record<T: DeserializeOwned>(
        &self,
        table: RecordTable,
        id: u64,
    ) -> Result<Option<T>, CircaError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(table).map_err(store_err)?;
        let record = match table.get(id).map_err(store_err)? {
            Some(data) => Some(decode(data.value())?),
            None => None,
        };
        Ok(record)
    }

    fn read_all<T: DeserializeOwned>(&self, table: RecordTable) -> Result<Vec<T>, CircaError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(table).map_err(store_err)?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(store_err)? {
            let (_, value) = entry.map_err(store_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn read_indexed<T: DeserializeOwned>(
        &self,
        index: IndexTable,
        table: RecordTable,
        project: ProjectId,
    ) -> Result<Vec<T>, CircaError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let index = read_txn.open_table(index).map_err(store_err)?;
        let table = read_txn.open_table(table).map_err(store_err)?;

        let mut records = Vec::new();
        for entry in index
            .range((project.0, 0u64)..=(project.0, u64::MAX))
            .map_err(store_err)?
        {
            let (key, _) = entry.map_err(store_err)?;
            let (_, id) = key.value();
            if let Some(data) = table.get(id).map_err(store_err)? {
                records.push(decode(data.value())?);
            }
        }
        Ok(records)
    }

    fn count(&self, table: RecordTable) -> Result<usize, CircaError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = read_txn.open_table(table).map_err(store_err)?;
        Ok(table.len().map_err(store_err)? as usize)
    }

    /// Apply `apply` to every node of a batch inside one write transaction.
    fn update_nodes(
        &mut self,
        updates: &[(NodeId, f64)],
        apply: impl Fn(&mut Node, f64),
    ) -> Result<(), CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        for (id, value) in updates {
            let mut node: Node = get_record_in(&write_txn, NODES, id.0)?
                .ok_or_else(|| CircaError::not_found(RecordKind::Node, id.0))?;
            apply(&mut node, *value);
            put_record(&write_txn, NODES, id.0, &node)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }
}

// =============================================================================
// NODESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl NodeStore for RedbStore {
    fn create_project(&mut self, name: &str) -> Result<Project, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let project = Project {
            id: ProjectId(next_id(&write_txn, SEQ_PROJECT)?),
            name: name.to_string(),
        };
        put_record(&write_txn, PROJECTS, project.id.0, &project)?;
        write_txn.commit().map_err(store_err)?;
        Ok(project)
    }

    fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CircaError> {
        self.read_record(PROJECTS, id.0)
    }

    fn projects(&self) -> Result<Vec<Project>, CircaError> {
        self.read_all(PROJECTS)
    }

    fn create_material(&mut self, material: NewMaterial) -> Result<Material, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let material = material.into_material(MaterialId(next_id(&write_txn, SEQ_MATERIAL)?));
        put_record(&write_txn, MATERIALS, material.id.0, &material)?;
        write_txn.commit().map_err(store_err)?;
        Ok(material)
    }

    fn get_material(&self, id: MaterialId) -> Result<Option<Material>, CircaError> {
        self.read_record(MATERIALS, id.0)
    }

    fn get_materials(&self) -> Result<Vec<Material>, CircaError> {
        self.read_all(MATERIALS)
    }

    fn delete_material(&mut self, id: MaterialId) -> Result<Option<Material>, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let removed = take_record(&write_txn, MATERIALS, id.0)?;
        write_txn.commit().map_err(store_err)?;
        Ok(removed)
    }

    fn create_node(&mut self, node: NewNode) -> Result<Node, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let node = node.into_node(NodeId(next_id(&write_txn, SEQ_NODE)?));
        put_record(&write_txn, NODES, node.id.0, &node)?;
        put_index(&write_txn, PROJECT_NODES, (node.project_id.0, node.id.0))?;
        write_txn.commit().map_err(store_err)?;
        Ok(node)
    }

    fn get_node(&self, id: NodeId) -> Result<Option<Node>, CircaError> {
        self.read_record(NODES, id.0)
    }

    fn get_nodes(&self, project: ProjectId) -> Result<Vec<Node>, CircaError> {
        self.read_indexed(PROJECT_NODES, NODES, project)
    }

    fn delete_node(&mut self, id: NodeId) -> Result<Option<Node>, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let Some(node) = take_record::<Node>(&write_txn, NODES, id.0)? else {
            return Ok(None);
        };
        drop_index(&write_txn, PROJECT_NODES, (node.project_id.0, id.0))?;

        // Relations always live in the same project as their endpoints.
        for relation_id in index_ids(&write_txn, PROJECT_RELATIONS, node.project_id.0)? {
            let touches = get_record_in::<Relation>(&write_txn, RELATIONS, relation_id)?
                .is_some_and(|r| r.source_id == id || r.target_id == id);
            if touches {
                take_record::<Relation>(&write_txn, RELATIONS, relation_id)?;
                drop_index(
                    &write_txn,
                    PROJECT_RELATIONS,
                    (node.project_id.0, relation_id),
                )?;
            }
        }

        write_txn.commit().map_err(store_err)?;
        Ok(Some(node))
    }

    fn update_node_weights(&mut self, updates: &[(NodeId, f64)]) -> Result<(), CircaError> {
        self.update_nodes(updates, |node, weight| node.weight = Some(weight))
    }

    fn update_node_scores(&mut self, updates: &[(NodeId, f64)]) -> Result<(), CircaError> {
        self.update_nodes(updates, |node, score| {
            node.sustainability_score = Some(score);
        })
    }

    fn create_relation(&mut self, relation: NewRelation) -> Result<Relation, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let relation = relation.into_relation(RelationId(next_id(&write_txn, SEQ_RELATION)?));
        put_record(&write_txn, RELATIONS, relation.id.0, &relation)?;
        put_index(
            &write_txn,
            PROJECT_RELATIONS,
            (relation.project_id.0, relation.id.0),
        )?;
        write_txn.commit().map_err(store_err)?;
        Ok(relation)
    }

    fn get_relation(&self, id: RelationId) -> Result<Option<Relation>, CircaError> {
        self.read_record(RELATIONS, id.0)
    }

    fn get_relations(&self, project: ProjectId) -> Result<Vec<Relation>, CircaError> {
        self.read_indexed(PROJECT_RELATIONS, RELATIONS, project)
    }

    fn delete_relation(&mut self, id: RelationId) -> Result<Option<Relation>, CircaError> {
        let write_txn = self.db.begin_write().map_err(store_err)?;
        let removed = take_record::<Relation>(&write_txn, RELATIONS, id.0)?;
        if let Some(relation) = &removed {
            drop_index(
                &write_txn,
                PROJECT_RELATIONS,
                (relation.project_id.0, relation.id.0),
            )?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(removed)
    }

    fn stats(&self) -> Result<StoreStats, CircaError> {
        Ok(StoreStats {
            projects: self.count(PROJECTS)?,
            materials: self.count(MATERIALS)?,
            nodes: self.count(NODES)?,
            relations: self.count(RELATIONS)?,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ConnectionKind, ConnectionType};
    use tempfile::tempdir;

    fn steel() -> NewMaterial {
        NewMaterial {
            name: "steel".to_string(),
            weight: 7.8,
            co2_value: 1.9,
            hardness: 10.0,
        }
    }

    fn part(
        project: ProjectId,
        material: MaterialId,
        parent: Option<NodeId>,
        level: u32,
    ) -> NewNode {
        NewNode {
            project_id: project,
            material_id: material,
            name: "part".to_string(),
            parent_id: parent,
            atomic: parent.is_some(),
            reusable: true,
            connection_type: Some(ConnectionType::Known(ConnectionKind::Screw)),
            level,
            weight: parent.map(|_| 2.0),
            recyclable: false,
        }
    }

    #[test]
    fn create_and_lookup_records() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let project = store.create_project("chair").expect("project");
        let material = store.create_material(steel()).expect("material");
        let node = store
            .create_node(part(project.id, material.id, None, 0))
            .expect("node");

        assert_eq!(store.get_project(project.id).expect("get"), Some(project));
        assert_eq!(store.get_material(material.id).expect("get"), Some(material));
        assert_eq!(store.get_node(node.id).expect("get"), Some(node));
        assert_eq!(store.get_node(NodeId(42)).expect("get"), None);
    }

    #[test]
    fn nodes_are_listed_per_project() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let a = store.create_project("a").expect("project");
        let b = store.create_project("b").expect("project");
        let m = store.create_material(steel()).expect("material");
        let root_a = store.create_node(part(a.id, m.id, None, 0)).expect("node");
        store.create_node(part(b.id, m.id, None, 0)).expect("node");
        store
            .create_node(part(a.id, m.id, Some(root_a.id), 1))
            .expect("node");

        let nodes = store.get_nodes(a.id).expect("nodes");
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.project_id == a.id));
        assert_eq!(store.get_parent_level(root_a.id, b.id).expect("level"), None);
    }

    #[test]
    fn delete_node_cascades_relations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let p = store.create_project("p").expect("project");
        let m = store.create_material(steel()).expect("material");
        let x = store.create_node(part(p.id, m.id, None, 0)).expect("node");
        let y = store.create_node(part(p.id, m.id, None, 0)).expect("node");
        let z = store.create_node(part(p.id, m.id, None, 0)).expect("node");
        for (s, t) in [(x.id, y.id), (z.id, x.id), (y.id, z.id)] {
            store
                .create_relation(NewRelation {
                    project_id: p.id,
                    source_id: s,
                    target_id: t,
                })
                .expect("relation");
        }

        store.delete_node(x.id).expect("delete");

        let relations = store.get_relations(p.id).expect("relations");
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source_id, y.id);
        assert_eq!(store.stats().expect("stats").relations, 1);
        assert_eq!(store.delete_node(x.id).expect("delete again"), None);
    }

    #[test]
    fn weight_batch_is_all_or_nothing() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let p = store.create_project("p").expect("project");
        let m = store.create_material(steel()).expect("material");
        let n = store.create_node(part(p.id, m.id, None, 0)).expect("node");

        let result = store.update_node_weights(&[(n.id, 4.0), (NodeId(999), 1.0)]);
        assert!(matches!(result, Err(CircaError::NotFound { .. })));
        assert_eq!(store.get_node(n.id).expect("get").and_then(|n| n.weight), None);

        store.update_node_weights(&[(n.id, 4.0)]).expect("update");
        assert_eq!(store.get_node(n.id).expect("get").and_then(|n| n.weight), Some(4.0));
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let db_path = temp.path().join("test.redb");

        let node_id = {
            let mut store = RedbStore::open(&db_path).expect("open db");
            let p = store.create_project("p").expect("project");
            let m = store.create_material(steel()).expect("material");
            let n = store.create_node(part(p.id, m.id, None, 0)).expect("node");
            store.update_node_weights(&[(n.id, 3.5)]).expect("weights");
            store.update_node_scores(&[(n.id, 1.25)]).expect("scores");
            n.id
        };

        let mut store = RedbStore::open(&db_path).expect("reopen db");
        let node = store.get_node(node_id).expect("get").expect("present");
        assert_eq!(node.weight, Some(3.5));
        assert_eq!(node.sustainability_score, Some(1.25));
        assert_eq!(
            node.connection_type,
            Some(ConnectionType::Known(ConnectionKind::Screw))
        );

        // Sequences continue where they stopped.
        let p2 = store.create_project("q").expect("project");
        assert_eq!(p2.id, ProjectId(2));
    }

    #[test]
    fn delete_material_and_relation() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        let p = store.create_project("p").expect("project");
        let m = store.create_material(steel()).expect("material");
        let a = store.create_node(part(p.id, m.id, None, 0)).expect("node");
        let r = store
            .create_relation(NewRelation {
                project_id: p.id,
                source_id: a.id,
                target_id: a.id,
            })
            .expect("relation");

        assert_eq!(store.delete_relation(r.id).expect("delete"), Some(r));
        assert!(store.get_relations(p.id).expect("relations").is_empty());
        assert!(store.delete_material(m.id).expect("delete").is_some());
        assert!(store.get_materials().expect("materials").is_empty());
    }

    #[test]
    fn compact_keeps_data() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store.create_project("p").expect("project");
        store.compact().expect("compact");
        assert_eq!(store.projects().expect("projects").len(), 1);
    }
}
