//! # Change Events
//!
//! Structured notifications emitted after a mutation commits.
//!
//! Events are serialized as `{"op": "...", ...payload}`. Each event is
//! delivered to a `Scope`: one project, or every subscriber at once.
//! Delivery is best-effort: a sink never reports failure back to the core.

use crate::primitives::BROADCAST_PROJECT_ID;
use crate::scorer::NodeScore;
use crate::types::{Material, MaterialId, Node, NodeId, Project, ProjectId, RelationId};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// A committed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeEvent {
    CreateProject {
        project: Project,
    },
    CreateMaterial {
        material: Material,
    },
    DeleteMaterial {
        id: MaterialId,
    },
    CreateNode {
        node: Node,
    },
    DeleteNode {
        id: NodeId,
    },
    CreateRelation {
        id: RelationId,
        source: NodeId,
        target: NodeId,
    },
    DeleteRelation {
        id: RelationId,
    },
    Finalize {
        project_id: ProjectId,
        nodes: Vec<Node>,
    },
    Score {
        project_id: ProjectId,
        scores: Vec<NodeScore>,
    },
}

impl ChangeEvent {
    /// The `op` tag of this event.
    #[must_use]
    pub const fn op(&self) -> &'static str {
        match self {
            Self::CreateProject { .. } => "create_project",
            Self::CreateMaterial { .. } => "create_material",
            Self::DeleteMaterial { .. } => "delete_material",
            Self::CreateNode { .. } => "create_node",
            Self::DeleteNode { .. } => "delete_node",
            Self::CreateRelation { .. } => "create_relation",
            Self::DeleteRelation { .. } => "delete_relation",
            Self::Finalize { .. } => "finalize",
            Self::Score { .. } => "score",
        }
    }
}

/// Audience of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// Every subscriber.
    All,
    /// Subscribers of one project, plus broadcast subscribers.
    Project(ProjectId),
}

impl Scope {
    /// Scope for a project id. The broadcast id maps to `All`.
    #[must_use]
    pub const fn project(id: ProjectId) -> Self {
        if id.0 == BROADCAST_PROJECT_ID {
            Self::All
        } else {
            Self::Project(id)
        }
    }

    /// Whether a subscriber of `subscription` should receive this scope.
    #[must_use]
    pub fn reaches(&self, subscription: ProjectId) -> bool {
        match self {
            Self::All => true,
            Self::Project(id) => subscription.0 == BROADCAST_PROJECT_ID || *id == subscription,
        }
    }
}

/// Receiver of change events.
///
/// Called after the store commit succeeds. Implementations must not block
/// for long and must swallow their own delivery errors.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, scope: Scope, event: &ChangeEvent);
}

/// A sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _scope: Scope, _event: &ChangeEvent) {}
}

/// A sink that keeps every event in memory, in delivery order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(Scope, ChangeEvent)>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<(Scope, ChangeEvent)> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Recorded events a subscriber of `subscription` would have received.
    #[must_use]
    pub fn received_by(&self, subscription: ProjectId) -> Vec<ChangeEvent> {
        self.events()
            .into_iter()
            .filter(|(scope, _)| scope.reaches(subscription))
            .map(|(_, event)| event)
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, scope: Scope, event: &ChangeEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push((scope, event.clone()));
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
