// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware as axum_middleware};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use ragline_chat::{AgentService, ChatService};
use ragline_config::model::ServerConfig;
use ragline_core::{PluginAdapter, RaglineError};
use ragline_knowledge::{IngestKnowledgeSpace, IngestProductCatalog, KnowledgeSpaceCatalog};

use crate::auth::{Authenticator, auth_middleware};
use crate::handlers;
use crate::sse::ChunkGenerator;

/// Renders the Prometheus exposition text.
pub type MetricsRender = Arc<dyn Fn() -> String + Send + Sync>;

/// State for the unauthenticated health and metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    pub storage: Arc<dyn PluginAdapter>,
    pub prometheus_render: Option<MetricsRender>,
}

/// Shared state for axum request handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub ingest: Arc<IngestKnowledgeSpace>,
    pub products: Arc<IngestProductCatalog>,
    pub catalog: Arc<KnowledgeSpaceCatalog>,
    pub agents: Arc<AgentService>,
    pub chat: Arc<ChatService>,
    pub generator: ChunkGenerator,
    /// Pause between streamed frames.
    pub frame_delay: Duration,
    pub health: HealthState,
    /// Fired on process shutdown; streaming turns observe a child token.
    pub shutdown: CancellationToken,
}

/// Builds the full route table.
///
/// - `GET /health`, `GET /metrics` (public)
/// - `POST/GET /v1/knowledge-spaces`, `POST /v1/knowledge-spaces/products`
/// - `GET/DELETE /v1/knowledge-spaces/{id}`, `GET /v1/knowledge-spaces/{id}/chunks`
/// - `POST /v1/agents`, `GET /v1/agents/{id}`
/// - `POST /v1/chat/completions`
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/metrics", get(handlers::get_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/v1/knowledge-spaces",
            post(handlers::create_knowledge_space).get(handlers::list_knowledge_spaces),
        )
        .route(
            "/v1/knowledge-spaces/products",
            post(handlers::create_product_space),
        )
        .route(
            "/v1/knowledge-spaces/{id}",
            get(handlers::get_knowledge_space).delete(handlers::delete_knowledge_space),
        )
        .route("/v1/knowledge-spaces/{id}/chunks", get(handlers::list_chunks))
        .route("/v1/agents", post(handlers::create_agent))
        .route("/v1/agents/{id}", get(handlers::get_agent))
        .route("/v1/chat/completions", post(handlers::chat_completions))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.auth),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Binds and serves until `shutdown` fires, then drains in-flight requests.
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), RaglineError> {
    let app = router(state, config.max_body_bytes);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RaglineError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| RaglineError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway stopped");
    Ok(())
}
