//! # Session Module
//!
//! The single entry point used by the HTTP API and the CLI.
//!
//! A session binds:
//! - one storage backend
//! - one notification sink
//! - the composite weight policy
//!
//! Every mutating method validates first, writes through the store, and
//! only then notifies the sink. A failed operation emits nothing.
//!
//! ## Storage Backends
//!
//! - `InMemory`: `MemoryStore` (fast, volatile unless explicitly saved)
//! - `Persistent`: `RedbStore` for disk-backed ACID storage

use crate::assembler::{self, GraphView};
use crate::events::{ChangeEvent, NotificationSink, NullSink, Scope};
use crate::scorer::NodeScore;
use crate::storage::RedbStore;
use crate::store::{MemoryStore, NodeStore, StoreStats};
use crate::types::{
    CircaError, Material, MaterialId, NewMaterial, NewNode, NewRelation, Node, NodeId, Project,
    ProjectId, RecordKind, Relation, RelationId,
};
use crate::validation::{self, WeightPolicy};
use std::path::Path;
use std::sync::Arc;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// A Session combines a store backend with a notification sink.
pub struct Session {
    backend: StorageBackend,
    sink: Arc<dyn NotificationSink>,
    policy: WeightPolicy,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("backend", &self.backend)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::with_backend(StorageBackend::default())
    }
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_backend(backend: StorageBackend) -> Self {
        Self {
            backend,
            sink: Arc::new(NullSink),
            policy: WeightPolicy::default(),
        }
    }

    /// Create a session with an existing in-memory store.
    #[must_use]
    pub fn with_store(store: MemoryStore) -> Self {
        Self::with_backend(StorageBackend::InMemory(store))
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    /// All changes are automatically persisted to disk.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, CircaError> {
        Ok(Self::with_redb_store(RedbStore::open(path)?))
    }

    /// Create a session with an existing `RedbStore`.
    #[must_use]
    pub fn with_redb_store(redb: RedbStore) -> Self {
        Self::with_backend(StorageBackend::Persistent(redb))
    }

    /// Replace the notification sink.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the composite weight policy.
    #[must_use]
    pub fn with_policy(mut self, policy: WeightPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> WeightPolicy {
        self.policy
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// The in-memory store, if this session uses one.
    ///
    /// Used by the app layer to write snapshot files.
    #[must_use]
    pub fn memory_store_opt(&self) -> Option<&MemoryStore> {
        match &self.backend {
            StorageBackend::InMemory(store) => Some(store),
            StorageBackend::Persistent(_) => None,
        }
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// The backend as a `NodeStore`.
    #[must_use]
    pub fn store(&self) -> &dyn NodeStore {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn store_mut(&mut self) -> &mut dyn NodeStore {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    fn notify(&self, scope: Scope, event: ChangeEvent) {
        self.sink.notify(scope, &event);
    }

    fn require_project(&self, id: ProjectId) -> Result<Project, CircaError> {
        self.store()
            .get_project(id)?
            .ok_or_else(|| CircaError::not_found(RecordKind::Project, id.0))
    }

    // =========================================================================
    // PROJECTS
    // =========================================================================

    /// Create a project. Project events are broadcast so project lists stay current.
    pub fn create_project(&mut self, name: &str) -> Result<Project, CircaError> {
        validation::validate_name("project", name)?;
        let project = self.store_mut().create_project(name.trim())?;
        self.notify(
            Scope::All,
            ChangeEvent::CreateProject {
                project: project.clone(),
            },
        );
        Ok(project)
    }

    pub fn get_project(&self, id: ProjectId) -> Result<Project, CircaError> {
        self.require_project(id)
    }

    pub fn projects(&self) -> Result<Vec<Project>, CircaError> {
        self.store().projects()
    }

    // =========================================================================
    // MATERIALS
    // =========================================================================

    /// Create a material. Material events are broadcast to every scope.
    pub fn create_material(&mut self, material: NewMaterial) -> Result<Material, CircaError> {
        validation::validate_material(&material)?;
        let material = self.store_mut().create_material(material)?;
        self.notify(
            Scope::All,
            ChangeEvent::CreateMaterial {
                material: material.clone(),
            },
        );
        Ok(material)
    }

    pub fn get_material(&self, id: MaterialId) -> Result<Material, CircaError> {
        self.store()
            .get_material(id)?
            .ok_or_else(|| CircaError::not_found(RecordKind::Material, id.0))
    }

    pub fn materials(&self) -> Result<Vec<Material>, CircaError> {
        self.store().get_materials()
    }

    /// Delete a material. Nodes that reference it keep their `material_id`
    /// and score 0.0 until it is replaced.
    pub fn delete_material(&mut self, id: MaterialId) -> Result<Option<Material>, CircaError> {
        let removed = self.store_mut().delete_material(id)?;
        self.notify(Scope::All, ChangeEvent::DeleteMaterial { id });
        Ok(removed)
    }

    // =========================================================================
    // NODES
    // =========================================================================

    /// Validate and insert a node.
    ///
    /// # Errors
    ///
    /// `NotFound`, `InvalidLevel`, `ParentNotFound`, `InvalidWeight` or
    /// `InvalidInput` before anything is written; `Store` on write failure.
    pub fn create_node(&mut self, node: NewNode) -> Result<Node, CircaError> {
        let node = validation::validate_new_node(self.store(), node, self.policy)?;
        let node = self.store_mut().create_node(node)?;
        self.notify(
            Scope::project(node.project_id),
            ChangeEvent::CreateNode { node: node.clone() },
        );
        Ok(node)
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node, CircaError> {
        self.store()
            .get_node(id)?
            .ok_or_else(|| CircaError::not_found(RecordKind::Node, id.0))
    }

    /// All nodes of an existing project, ordered by id.
    pub fn nodes(&self, project: ProjectId) -> Result<Vec<Node>, CircaError> {
        self.require_project(project)?;
        self.store().get_nodes(project)
    }

    /// Delete a node and its relations.
    ///
    /// Deleting an unknown node is a no-op that is still announced to every scope.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Option<Node>, CircaError> {
        let removed = self.store_mut().delete_node(id)?;
        let scope = removed
            .as_ref()
            .map_or(Scope::All, |node| Scope::project(node.project_id));
        self.notify(scope, ChangeEvent::DeleteNode { id });
        Ok(removed)
    }

    // =========================================================================
    // RELATIONS
    // =========================================================================

    pub fn create_relation(&mut self, relation: NewRelation) -> Result<Relation, CircaError> {
        validation::validate_relation(self.store(), &relation)?;
        let relation = self.store_mut().create_relation(relation)?;
        self.notify(
            Scope::project(relation.project_id),
            ChangeEvent::CreateRelation {
                id: relation.id,
                source: relation.source_id,
                target: relation.target_id,
            },
        );
        Ok(relation)
    }

    pub fn get_relation(&self, id: RelationId) -> Result<Relation, CircaError> {
        self.store()
            .get_relation(id)?
            .ok_or_else(|| CircaError::not_found(RecordKind::Relation, id.0))
    }

    pub fn delete_relation(&mut self, id: RelationId) -> Result<Option<Relation>, CircaError> {
        let removed = self.store_mut().delete_relation(id)?;
        let scope = removed
            .as_ref()
            .map_or(Scope::All, |relation| Scope::project(relation.project_id));
        self.notify(scope, ChangeEvent::DeleteRelation { id });
        Ok(removed)
    }

    // =========================================================================
    // GRAPH OPERATIONS
    // =========================================================================

    /// Read-only project view with previewed composite weights.
    pub fn assemble_graph(&self, project: ProjectId) -> Result<GraphView, CircaError> {
        assembler::assemble_graph(self.store(), project)
    }

    /// Persist aggregated composite weights. Returns every project node.
    pub fn finalize(&mut self, project: ProjectId) -> Result<Vec<Node>, CircaError> {
        let nodes = assembler::finalize(self.store_mut(), project)?;
        self.notify(
            Scope::project(project),
            ChangeEvent::Finalize {
                project_id: project,
                nodes: nodes.clone(),
            },
        );
        Ok(nodes)
    }

    /// Score and persist every node of a project.
    pub fn score(&mut self, project: ProjectId) -> Result<Vec<NodeScore>, CircaError> {
        let scores = assembler::score(self.store_mut(), project)?;
        self.notify(
            Scope::project(project),
            ChangeEvent::Score {
                project_id: project,
                scores: scores.clone(),
            },
        );
        Ok(scores)
    }

    /// Record counts of the backend.
    pub fn stats(&self) -> Result<StoreStats, CircaError> {
        self.store().stats()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;

    fn oak() -> NewMaterial {
        NewMaterial {
            name: "oak".to_string(),
            weight: 0.7,
            co2_value: 1.0,
            hardness: 3.8,
        }
    }

    fn root(project: ProjectId, material: MaterialId) -> NewNode {
        NewNode {
            project_id: project,
            material_id: material,
            name: "table".to_string(),
            parent_id: None,
            atomic: false,
            reusable: false,
            connection_type: None,
            level: 0,
            weight: None,
            recyclable: true,
        }
    }

    #[test]
    fn mutations_notify_after_commit() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = Session::new().with_sink(sink.clone());

        let project = session.create_project("table").expect("project");
        let material = session.create_material(oak()).expect("material");
        session
            .create_node(root(project.id, material.id))
            .expect("node");

        let ops: Vec<&str> = sink.events().iter().map(|(_, e)| e.op()).collect();
        assert_eq!(ops, vec!["create_project", "create_material", "create_node"]);
        assert_eq!(sink.events()[1].0, Scope::All);
        assert_eq!(sink.events()[2].0, Scope::Project(project.id));
    }

    #[test]
    fn failed_validation_emits_nothing() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = Session::new().with_sink(sink.clone());

        let project = session.create_project("table").expect("project");
        let material = session.create_material(oak()).expect("material");
        let mut bad = root(project.id, material.id);
        bad.level = 1;

        assert!(matches!(
            session.create_node(bad),
            Err(CircaError::InvalidLevel(_))
        ));
        assert_eq!(sink.events().len(), 2);
        assert_eq!(session.stats().expect("stats").nodes, 0);
    }

    #[test]
    fn lenient_policy_discards_composite_weight() {
        let mut session = Session::new();
        let project = session.create_project("table").expect("project");
        let material = session.create_material(oak()).expect("material");
        let mut node = root(project.id, material.id);
        node.weight = Some(12.0);

        let created = session.create_node(node).expect("node");
        assert_eq!(created.weight, None);
    }

    #[test]
    fn strict_policy_rejects_composite_weight() {
        let mut session = Session::new().with_policy(WeightPolicy::Strict);
        let project = session.create_project("table").expect("project");
        let material = session.create_material(oak()).expect("material");
        let mut node = root(project.id, material.id);
        node.weight = Some(12.0);

        assert!(matches!(
            session.create_node(node),
            Err(CircaError::InvalidWeight(_))
        ));
    }

    #[test]
    fn deleting_unknown_node_broadcasts() {
        let sink = Arc::new(RecordingSink::new());
        let mut session = Session::new().with_sink(sink.clone());

        assert_eq!(session.delete_node(NodeId(5)).expect("delete"), None);
        assert_eq!(
            sink.events(),
            vec![(Scope::All, ChangeEvent::DeleteNode { id: NodeId(5) })]
        );
    }

    #[test]
    fn lookups_report_not_found() {
        let session = Session::new();
        assert!(matches!(
            session.get_node(NodeId(1)),
            Err(CircaError::NotFound {
                kind: RecordKind::Node,
                id: 1
            })
        ));
        assert!(matches!(
            session.get_material(MaterialId(1)),
            Err(CircaError::NotFound { .. })
        ));
        assert!(matches!(
            session.nodes(ProjectId(1)),
            Err(CircaError::NotFound { .. })
        ));
    }

    #[test]
    fn redb_session_is_persistent() {
        let temp = tempfile::tempdir().expect("temp dir");
        let session = Session::with_redb(temp.path().join("s.redb")).expect("open");
        assert!(session.is_persistent());
        assert!(session.memory_store_opt().is_none());
        assert!(!Session::new().is_persistent());
    }

    #[test]
    fn blank_project_name_is_rejected() {
        let mut session = Session::new();
        assert!(matches!(
            session.create_project("   "),
            Err(CircaError::InvalidInput(_))
        ));
    }
}
