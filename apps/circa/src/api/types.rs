//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use circa_core::{
    CircaError, ConnectionType, MaterialId, NewMaterial, NewNode, NewRelation, NodeId, ProjectId,
    StoreStats,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Store status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub projects: usize,
    pub materials: usize,
    pub nodes: usize,
    pub relations: usize,
    pub persistent: bool,
    pub live_subscribers: usize,
}

impl StatusResponse {
    pub fn new(stats: StoreStats, persistent: bool, live_subscribers: usize) -> Self {
        Self {
            projects: stats.projects,
            materials: stats.materials,
            nodes: stats.nodes,
            relations: stats.relations,
            persistent,
            live_subscribers,
        }
    }
}

// =============================================================================
// PROJECT / MATERIAL REQUESTS
// =============================================================================

/// Project creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

/// Material creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialRequest {
    pub name: String,
    pub weight: f64,
    pub co2_value: f64,
    pub hardness: f64,
}

impl From<MaterialRequest> for NewMaterial {
    fn from(request: MaterialRequest) -> Self {
        Self {
            name: request.name,
            weight: request.weight,
            co2_value: request.co2_value,
            hardness: request.hardness,
        }
    }
}

// =============================================================================
// NODE REQUEST
// =============================================================================

/// A connection type as clients send it: a numeric code or a string.
///
/// Strings may be a kind name in any case, a decimal code, or a custom tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectionTypeInput {
    Code(u64),
    Text(String),
}

impl From<ConnectionTypeInput> for ConnectionType {
    fn from(input: ConnectionTypeInput) -> Self {
        match input {
            ConnectionTypeInput::Code(code) => Self::from_code(code),
            ConnectionTypeInput::Text(text) => Self::parse(&text),
        }
    }
}

/// Node creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRequest {
    pub project_id: u64,
    pub material_id: u64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<u64>,
    pub atomic: bool,
    #[serde(default)]
    pub reusable: bool,
    #[serde(default)]
    pub connection_type: Option<ConnectionTypeInput>,
    pub level: u32,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub recyclable: bool,
}

impl From<NodeRequest> for NewNode {
    fn from(request: NodeRequest) -> Self {
        Self {
            project_id: ProjectId(request.project_id),
            material_id: MaterialId(request.material_id),
            name: request.name,
            parent_id: request.parent_id.map(NodeId),
            atomic: request.atomic,
            reusable: request.reusable,
            connection_type: request.connection_type.map(ConnectionType::from),
            level: request.level,
            weight: request.weight,
            recyclable: request.recyclable,
        }
    }
}

// =============================================================================
// RELATION REQUEST
// =============================================================================

/// Relation creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationRequest {
    pub project_id: u64,
    pub source_id: u64,
    pub target_id: u64,
}

impl From<RelationRequest> for NewRelation {
    fn from(request: RelationRequest) -> Self {
        Self {
            project_id: ProjectId(request.project_id),
            source_id: NodeId(request.source_id),
            target_id: NodeId(request.target_id),
        }
    }
}

// =============================================================================
// DELETE RESPONSE
// =============================================================================

/// Response of every delete endpoint. Deleting an absent record succeeds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted: bool,
}

impl DeleteResponse {
    pub fn new(deleted: bool) -> Self {
        Self { ok: true, deleted }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error payload: `{"error": {"category", "message"}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub category: String,
    pub message: String,
}

/// A core error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub CircaError);

impl From<CircaError> for ApiError {
    fn from(err: CircaError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// HTTP status for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CircaError::NotFound { .. } => StatusCode::NOT_FOUND,
            CircaError::Store(_) | CircaError::Io(_) => StatusCode::SERVICE_UNAVAILABLE,
            CircaError::ParentNotFound { .. }
            | CircaError::InvalidLevel(_)
            | CircaError::InvalidWeight(_)
            | CircaError::InvalidInput(_)
            | CircaError::CycleDetected(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let category = self.0.category();

        // Store detail stays in the log.
        let message = if self.0.is_client_error() {
            tracing::debug!(category, "Request rejected: {}", self.0);
            self.0.to_string()
        } else {
            tracing::error!(category, "Backend failure: {}", self.0);
            "storage backend unavailable".to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                category: category.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}
