//! API route definitions

use super::auth_handlers;
use super::handlers::{self, AppState};
use crate::auth::middleware::require_auth;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Routes behind the access-token guard
    let protected = Router::new()
        .route("/api/auth/logout", post(auth_handlers::logout))
        .route("/api/auth/me", get(auth_handlers::me))
        .layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/auth/signup", post(auth_handlers::signup))
        .route("/api/auth/login", post(auth_handlers::login))
        .route("/api/auth/refresh", post(auth_handlers::refresh))
        .route(
            "/api/auth/oauth2/{provider}",
            get(auth_handlers::oauth2_authorize),
        )
        .route(
            "/api/auth/oauth2/{provider}/callback",
            get(auth_handlers::oauth2_callback),
        )
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
