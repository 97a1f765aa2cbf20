//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Mutations take the session write lock, so they are serialized with
//! each other and with finalize/score. Reads share the read lock.

use super::{
    AppState,
    types::{
        ApiError, CreateProjectRequest, DeleteResponse, HealthResponse, MaterialRequest,
        NodeRequest, RelationRequest, StatusResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use circa_core::{
    GraphView, Material, MaterialId, Node, NodeId, NodeScore, Project, ProjectId, Relation,
    RelationId,
};

type ApiResult<T> = Result<(StatusCode, Json<T>), ApiError>;

// =============================================================================
// HEALTH / STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Record counts and backend information.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let session = state.session.read().await;
    let stats = session.stats()?;
    let response = StatusResponse::new(
        stats,
        session.is_persistent(),
        state.live.subscriber_count(),
    );
    Ok((StatusCode::OK, Json(response)))
}

// =============================================================================
// PROJECT HANDLERS
// =============================================================================

/// Create a project.
pub async fn create_project_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<Project> {
    let mut session = state.session.write().await;
    let project = session.create_project(&request.name)?;
    Ok((StatusCode::OK, Json(project)))
}

/// List every project.
pub async fn list_projects_handler(State(state): State<AppState>) -> ApiResult<Vec<Project>> {
    let session = state.session.read().await;
    Ok((StatusCode::OK, Json(session.projects()?)))
}

/// Get one project.
pub async fn get_project_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Project> {
    let session = state.session.read().await;
    Ok((StatusCode::OK, Json(session.get_project(ProjectId(id))?)))
}

/// Assemble the project graph with previewed composite weights.
pub async fn graph_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<GraphView> {
    let session = state.session.read().await;
    Ok((StatusCode::OK, Json(session.assemble_graph(ProjectId(id))?)))
}

/// Persist aggregated composite weights.
pub async fn finalize_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Vec<Node>> {
    let mut session = state.session.write().await;
    let nodes = session.finalize(ProjectId(id))?;
    tracing::info!(project = id, nodes = nodes.len(), "Project finalized");
    Ok((StatusCode::OK, Json(nodes)))
}

/// Compute and persist sustainability scores.
pub async fn score_handler(
    State(state): State<AppState>,
    Path(project_id): Path<u64>,
) -> ApiResult<Vec<NodeScore>> {
    let mut session = state.session.write().await;
    let scores = session.score(ProjectId(project_id))?;
    tracing::info!(project = project_id, nodes = scores.len(), "Project scored");
    Ok((StatusCode::OK, Json(scores)))
}

// =============================================================================
// MATERIAL HANDLERS
// =============================================================================

/// Create a material.
pub async fn create_material_handler(
    State(state): State<AppState>,
    Json(request): Json<MaterialRequest>,
) -> ApiResult<Material> {
    let mut session = state.session.write().await;
    let material = session.create_material(request.into())?;
    Ok((StatusCode::OK, Json(material)))
}

/// List every material.
pub async fn list_materials_handler(State(state): State<AppState>) -> ApiResult<Vec<Material>> {
    let session = state.session.read().await;
    Ok((StatusCode::OK, Json(session.materials()?)))
}

/// Get one material.
pub async fn get_material_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Material> {
    let session = state.session.read().await;
    Ok((StatusCode::OK, Json(session.get_material(MaterialId(id))?)))
}

/// Delete a material.
pub async fn delete_material_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let mut session = state.session.write().await;
    let deleted = session.delete_material(MaterialId(id))?.is_some();
    Ok((StatusCode::OK, Json(DeleteResponse::new(deleted))))
}

// =============================================================================
// NODE HANDLERS
// =============================================================================

/// Create a node after validating level, parent and weight.
pub async fn create_node_handler(
    State(state): State<AppState>,
    Json(request): Json<NodeRequest>,
) -> ApiResult<Node> {
    let mut session = state.session.write().await;
    let node = session.create_node(request.into())?;
    Ok((StatusCode::OK, Json(node)))
}

/// Get one node.
pub async fn get_node_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Node> {
    let session = state.session.read().await;
    Ok((StatusCode::OK, Json(session.get_node(NodeId(id))?)))
}

/// Delete a node and every relation that references it.
pub async fn delete_node_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let mut session = state.session.write().await;
    let deleted = session.delete_node(NodeId(id))?.is_some();
    Ok((StatusCode::OK, Json(DeleteResponse::new(deleted))))
}

// =============================================================================
// RELATION HANDLERS
// =============================================================================

/// Create a relation between two nodes of one project.
pub async fn create_relation_handler(
    State(state): State<AppState>,
    Json(request): Json<RelationRequest>,
) -> ApiResult<Relation> {
    let mut session = state.session.write().await;
    let relation = session.create_relation(request.into())?;
    Ok((StatusCode::OK, Json(relation)))
}

/// Delete a relation.
pub async fn delete_relation_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<DeleteResponse> {
    let mut session = state.session.write().await;
    let deleted = session.delete_relation(RelationId(id))?.is_some();
    Ok((StatusCode::OK, Json(DeleteResponse::new(deleted))))
}
