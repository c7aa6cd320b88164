//! Authentication route handlers.
//!
//! Endpoints:
//! - `POST /api/auth/signup`                     — Create a password account
//! - `POST /api/auth/login`                      — Email/password login
//! - `POST /api/auth/refresh`                    — Rotate the refresh token (body or cookie)
//! - `POST /api/auth/logout`                     — Drop the session (protected)
//! - `GET  /api/auth/me`                         — Current account (protected)
//! - `GET  /api/auth/oauth2/{provider}`          — Provider authorization URL
//! - `GET  /api/auth/oauth2/{provider}/callback` — Finish a federated login

use crate::api::handlers::{ApiJson, AppError, AppState};
use crate::auth::cookie::{build_clear_cookie, build_refresh_cookie, extract_refresh_token_from_cookie};
use crate::auth::error::AuthError;
use crate::auth::extractor::AuthUser;
use crate::auth::federated::redirect_url;
use crate::auth::service::TokenPair;
use crate::users::models::UserResponse;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Request / Response types
// ============================================================================

/// Request body for POST /api/auth/signup
#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

/// Request body for POST /api/auth/login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for POST /api/auth/refresh (optional when the cookie is sent)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Response for GET /api/auth/oauth2/{provider}
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

/// Query of the provider redirect back to us
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let user = state
        .auth
        .sign_up(&req.email, &req.password, &req.nickname)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Response, AppError> {
    let tokens = state.auth.login(&req.email, &req.password).await?;
    token_response(&state, tokens)
}

/// POST /api/auth/refresh — the token comes from the JSON body, or else
/// from the `refresh_token` cookie.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let from_body = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice::<RefreshRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid refresh request: {}", e)))?
    };

    let token = from_body
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .or_else(|| {
            headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .and_then(extract_refresh_token_from_cookie)
        })
        .ok_or(AuthError::InvalidToken("missing refresh token"))?;

    let tokens = state.auth.refresh(&token).await?;
    token_response(&state, tokens)
}

pub async fn logout(State(state): State<AppState>, user: AuthUser) -> Result<Response, AppError> {
    state.auth.logout(&user.email).await?;
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, build_clear_cookie(state.secure_cookies))],
    )
        .into_response())
}

pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    Ok(Json(state.auth.current_user(user.user_id).await?))
}

pub async fn oauth2_authorize(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Json<AuthUrlResponse>, AppError> {
    let client = state.providers.get(&provider)?;
    let login_state = state.oauth_states.issue(client.provider).await;
    Ok(Json(AuthUrlResponse {
        auth_url: client.auth_url(&login_state),
    }))
}

/// GET /api/auth/oauth2/{provider}/callback — exchange the code, reconcile
/// the identity, then hand the tokens over (redirect or JSON).
pub async fn oauth2_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, AppError> {
    let client = state.providers.get(&provider)?;

    if let Some(error) = query.error {
        tracing::warn!(provider = %client.provider, %error, "provider denied authorization");
        return Err(AppError::BadRequest("Authorization was not granted".to_string()));
    }
    let login_state = query
        .state
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::InvalidState)?;
    state.oauth_states.consume(&login_state, client.provider).await?;

    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let claims = client
        .exchange_code(&code)
        .await
        .map_err(AuthError::ProviderExchange)?;
    let login = state.federated.complete(&provider, &claims).await?;

    match state.oauth2_redirect_uri.as_deref() {
        Some(base) => Ok(Redirect::to(&redirect_url(base, &login.tokens)).into_response()),
        None => token_response(&state, login.tokens),
    }
}

/// JSON token pair plus the refresh cookie.
fn token_response(state: &AppState, tokens: TokenPair) -> Result<Response, AppError> {
    let cookie = build_refresh_cookie(
        &tokens.refresh_token,
        state.auth.settings().refresh_ttl.as_secs(),
        state.secure_cookies,
    )?;
    Ok(([(header::SET_COOKIE, cookie)], Json(tokens)).into_response())
}

// ============================================================================
// Tests
// ============================================================================
