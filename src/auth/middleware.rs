//! Access-token guard for Axum routes.
//!
//! Verifies the `Authorization: Bearer <token>` header and injects the
//! verified [`AccessClaims`](crate::auth::jwt::AccessClaims) into request extensions.

use crate::api::handlers::{AppError, AppState};
use crate::auth::error::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Middleware that requires a valid access token.
///
/// Missing or malformed headers, bad or expired tokens and refresh tokens
/// presented in place of an access token are all rejected with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidToken("missing bearer token"))?;

    let claims = state.auth.codec().verify_access(token)?;
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Tests
// ============================================================================
