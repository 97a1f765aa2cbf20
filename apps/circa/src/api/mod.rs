//! # Circa HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Liveness and version
//! - `GET /status` - Record counts
//! - `POST|GET /projects`, `GET /projects/{id}` - Projects
//! - `GET /projects/{id}/graph` - Assembled graph with previewed weights
//! - `POST /projects/{id}/finalize` - Persist composite weights
//! - `POST /score/{project_id}` - Compute and persist sustainability scores
//! - `POST|GET /materials`, `GET|DELETE /materials/{id}` - Materials
//! - `POST /nodes`, `GET|DELETE /nodes/{id}` - Nodes
//! - `POST /relations`, `DELETE /relations/{id}` - Relations
//! - `GET /socket/projects/{project_id}` - Websocket live events
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `CIRCA_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all
//!   (default: localhost only)
//! - `CIRCA_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `CIRCA_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
pub mod live;
mod middleware;
mod socket;
mod types;

pub use auth::get_api_key_from_env;
pub use live::LiveRegistry;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ApiError, ConnectionTypeInput, CreateProjectRequest, DeleteResponse, ErrorDetail,
    ErrorResponse, HealthResponse, MaterialRequest, NodeRequest, RelationRequest, StatusResponse,
};

use crate::config::Config;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use circa_core::{CircaError, NotificationSink, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB).
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the session and the live subscriber registry.
#[derive(Clone)]
pub struct AppState {
    /// The session containing the store.
    pub session: Arc<RwLock<Session>>,
    /// Websocket subscribers; also the session's notification sink.
    pub live: Arc<LiveRegistry>,
}

impl AppState {
    /// Create app state with the default live queue size.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::with_registry(session, LiveRegistry::default())
    }

    /// Create app state whose live queues hold `channel_capacity` events.
    #[must_use]
    pub fn with_capacity(session: Session, channel_capacity: usize) -> Self {
        Self::with_registry(session, LiveRegistry::new(channel_capacity))
    }

    fn with_registry(session: Session, registry: LiveRegistry) -> Self {
        let live = Arc::new(registry);
        let sink: Arc<dyn NotificationSink> = live.clone();
        Self {
            session: Arc::new(RwLock::new(session.with_sink(sink))),
            live,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Build CORS layer from `CIRCA_CORS_ORIGINS`.
///
/// - `*`: every origin (development only)
/// - unset: localhost only
/// - otherwise: the comma-separated origins; invalid entries are skipped
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("CIRCA_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (CIRCA_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", origin);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in CIRCA_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No CIRCA_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// CORS layer that only admits local development origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - 2 MiB
/// 4. Rate limiting - if enabled
/// 5. Authentication - if configured
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = create_rate_limiter(rate_limit);
    if rate_limiter.is_some() {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set CIRCA_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/projects",
            get(handlers::list_projects_handler).post(handlers::create_project_handler),
        )
        .route("/projects/{id}", get(handlers::get_project_handler))
        .route("/projects/{id}/graph", get(handlers::graph_handler))
        .route("/projects/{id}/finalize", post(handlers::finalize_handler))
        .route("/score/{project_id}", post(handlers::score_handler))
        .route(
            "/materials",
            get(handlers::list_materials_handler).post(handlers::create_material_handler),
        )
        .route(
            "/materials/{id}",
            get(handlers::get_material_handler).delete(handlers::delete_material_handler),
        )
        .route("/nodes", post(handlers::create_node_handler))
        .route(
            "/nodes/{id}",
            get(handlers::get_node_handler).delete(handlers::delete_node_handler),
        )
        .route("/relations", post(handlers::create_relation_handler))
        .route("/relations/{id}", delete(handlers::delete_relation_handler))
        .route("/socket/projects/{project_id}", get(socket::socket_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(DefaultBodyLimit::max(MAX_BODY_SIZE)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Resolve when the process receives Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Start the HTTP server and serve until Ctrl+C.
///
/// Returns the session after shutdown so the caller can save it.
pub async fn run_server(config: &Config, session: Session) -> Result<Session, CircaError> {
    let state = AppState::with_capacity(session, config.live.channel_capacity);
    let router = create_router(state.clone());
    let addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CircaError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Circa HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CircaError::Io(format!("Server error: {}", e)))?;

    let session = std::mem::take(&mut *state.session.write().await);
    Ok(session)
}
