//! # studyhub-api
//!
//! REST surface for StudyHub. Handlers are thin: they authenticate the caller,
//! parse ids and bodies, and hand off to the consistency engine.

pub mod identity;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use studyhub_engine::Engine;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    /// Shared secret for verifying bearer tokens from the hosted auth service.
    pub jwt_secret: String,
    /// Base URL of the hosted auth service's account API.
    pub identity_url: String,
    pub http: reqwest::Client,
}

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let state = Arc::new(state);

    let authenticated = Router::new()
        .merge(routes::communities::router())
        .merge(routes::requests::router())
        .merge(routes::account::router())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    let api_routes = Router::new()
        .merge(authenticated)
        .merge(routes::health::router());

    Router::new()
        .nest("/api/v1", api_routes)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
        .with_state(state)
}
