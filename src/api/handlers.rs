//! Shared HTTP state, error rendering and the health check.

use crate::auth::error::AuthError;
use crate::auth::federated::FederatedLoginFlow;
use crate::auth::oauth_state::AuthorizationStates;
use crate::auth::oidc::ProviderRegistry;
use crate::auth::service::AuthService;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

/// Server state shared by all handlers.
pub struct ServerState {
    pub auth: Arc<AuthService>,
    pub federated: Arc<FederatedLoginFlow>,
    pub providers: Arc<ProviderRegistry>,
    /// Pending `state` values of started provider logins
    pub oauth_states: Arc<AuthorizationStates>,
    /// Frontend URL receiving federated tokens; JSON responses when `None`
    pub oauth2_redirect_uri: Option<String>,
    /// Add `Secure` to the refresh cookie
    pub secure_cookies: bool,
}

pub type AppState = Arc<ServerState>;

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub providers: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        providers: state
            .providers
            .configured()
            .iter()
            .map(|p| p.key().to_string())
            .collect(),
    })
}

// ============================================================================
// Errors
// ============================================================================

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    BadRequest(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "C001", msg.clone()),
            AppError::Auth(err) => {
                let status = StatusCode::from_u16(err.status().as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let message = if err.is_infrastructure() {
                    match err {
                        AuthError::ProviderExchange(_) => "Identity provider is unavailable",
                        AuthError::Internal(_) => "Internal server error",
                        _ => "Service temporarily unavailable",
                    }
                    .to_string()
                } else {
                    err.to_string()
                };
                (status, err.code(), message)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if let AppError::Auth(ref err) = self {
            if err.is_infrastructure() {
                tracing::error!(code, error = %err, "request failed");
            }
        }

        let body = Json(serde_json::json!({
            "code": code,
            "message": message,
        }));

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// `Json` body extractor whose rejections render as C001.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);
