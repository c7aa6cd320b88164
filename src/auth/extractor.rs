//! AuthUser extractor for Axum handlers.
//!
//! Reads the [`AccessClaims`] that `require_auth` put into the request
//! extensions.

use crate::api::handlers::{AppError, AppState};
use crate::auth::error::AuthError;
use crate::auth::jwt::AccessClaims;
use crate::users::models::Role;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

/// Verified caller of a guarded route.
///
/// ```rust,ignore
/// async fn my_handler(user: AuthUser) -> impl IntoResponse {
///     format!("Hello, {}!", user.nickname)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub email: String,
    pub nickname: String,
    pub role: Role,
}

impl From<&AccessClaims> for AuthUser {
    fn from(claims: &AccessClaims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.email.clone(),
            nickname: claims.nickname.clone(),
            role: claims.role,
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let user = parts
            .extensions
            .get::<AccessClaims>()
            .map(AuthUser::from)
            .ok_or_else(|| AppError::from(AuthError::InvalidToken("route is not guarded")));
        async move { user }
    }
}
