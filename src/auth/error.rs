//! Error taxonomy of the authentication core.
//!
//! Domain variants are expected outcomes with a stable code; the
//! infrastructure variants (`StoreTimeout`, `Store`, `Internal`) carry store
//! and configuration failures through unchanged so callers can retry them.

use crate::users::store::{Constraint, UniqueViolation};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// HTTP-style status class of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    Unauthorized,
    NotFound,
    Conflict,
    BadGateway,
    Unavailable,
    Internal,
}

impl StatusClass {
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusClass::BadRequest => 400,
            StatusClass::Unauthorized => 401,
            StatusClass::NotFound => 404,
            StatusClass::Conflict => 409,
            StatusClass::BadGateway => 502,
            StatusClass::Unavailable => 503,
            StatusClass::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    // ── Validation ─────────────────────────────────────────────────────
    #[error("Email is already in use: {0}")]
    DuplicateEmail(String),

    #[error("Nickname is already in use: {0}")]
    DuplicateNickname(String),

    #[error("Invalid email format: {0}")]
    InvalidEmailFormat(String),

    #[error("Nickname must be 2-20 characters: {0}")]
    InvalidNicknameLength(String),

    #[error("Password must be at least 8 characters (got {length})")]
    InvalidPasswordFormat { length: usize },

    // ── Authentication ─────────────────────────────────────────────────
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(&'static str),

    #[error("Token has expired")]
    ExpiredToken,

    // ── Lookup ─────────────────────────────────────────────────────────
    #[error("User not found")]
    UserNotFound,

    // ── Federation ─────────────────────────────────────────────────────
    /// The key is kept for logs only; it is not part of the message.
    #[error("Unsupported identity provider")]
    UnsupportedProvider(String),

    #[error("Account already has a {provider} identity")]
    DuplicateIdentity { provider: String },

    #[error("Identity provider did not supply the {0} claim")]
    MissingClaim(&'static str),

    #[error("Identity provider exchange failed")]
    ProviderExchange(anyhow::Error),

    #[error("Authorization state is missing, expired or already used")]
    InvalidState,

    // ── Infrastructure ─────────────────────────────────────────────────
    #[error("Store call timed out after {0:?}")]
    StoreTimeout(Duration),

    #[error("Store failure: {0}")]
    Store(anyhow::Error),

    #[error("Internal error: {0}")]
    Internal(anyhow::Error),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "U001",
            AuthError::DuplicateEmail(_) => "U002",
            AuthError::DuplicateNickname(_) => "U003",
            AuthError::InvalidCredentials => "U004",
            AuthError::InvalidEmailFormat(_) => "U005",
            AuthError::InvalidNicknameLength(_) => "U006",
            AuthError::InvalidPasswordFormat { .. } => "U007",
            AuthError::InvalidToken(_) => "A001",
            AuthError::ExpiredToken => "A002",
            AuthError::UnsupportedProvider(_) => "F001",
            AuthError::DuplicateIdentity { .. } => "F002",
            AuthError::MissingClaim(_) => "F003",
            AuthError::ProviderExchange(_) => "F004",
            AuthError::InvalidState => "F005",
            AuthError::StoreTimeout(_) => "I001",
            AuthError::Store(_) => "I002",
            AuthError::Internal(_) => "C003",
        }
    }

    pub fn status(&self) -> StatusClass {
        match self {
            AuthError::InvalidEmailFormat(_)
            | AuthError::InvalidNicknameLength(_)
            | AuthError::InvalidPasswordFormat { .. }
            | AuthError::UnsupportedProvider(_)
            | AuthError::MissingClaim(_)
            | AuthError::InvalidState => StatusClass::BadRequest,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::ExpiredToken => StatusClass::Unauthorized,
            AuthError::UserNotFound => StatusClass::NotFound,
            AuthError::DuplicateEmail(_)
            | AuthError::DuplicateNickname(_)
            | AuthError::DuplicateIdentity { .. } => StatusClass::Conflict,
            AuthError::ProviderExchange(_) => StatusClass::BadGateway,
            AuthError::StoreTimeout(_) | AuthError::Store(_) => StatusClass::Unavailable,
            AuthError::Internal(_) => StatusClass::Internal,
        }
    }

    /// Infrastructure failures a caller may retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StoreTimeout(_) | AuthError::Store(_))
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AuthError::StoreTimeout(_)
                | AuthError::Store(_)
                | AuthError::ProviderExchange(_)
                | AuthError::Internal(_)
        )
    }

    /// Map a store error, turning typed uniqueness violations into domain errors.
    pub(crate) fn from_store(err: anyhow::Error, email: &str, provider: &str) -> Self {
        match err.downcast_ref::<UniqueViolation>().map(|v| v.constraint) {
            Some(Constraint::Email) => AuthError::DuplicateEmail(email.to_string()),
            Some(Constraint::ProviderSubject) | Some(Constraint::UserProvider) => {
                AuthError::DuplicateIdentity {
                    provider: provider.to_string(),
                }
            }
            None => AuthError::Store(err),
        }
    }

    /// Re-inspect a wrapped store error for uniqueness violations.
    pub(crate) fn or_unique(self, email: &str, provider: &str) -> Self {
        match self {
            AuthError::Store(err) => AuthError::from_store(err, email, provider),
            other => other,
        }
    }
}

/// Run a store call under `timeout`.
///
/// Elapsed deadlines become [`AuthError::StoreTimeout`]; store errors become
/// [`AuthError::Store`].
pub(crate) async fn within<T, F>(timeout: Duration, call: F) -> Result<T, AuthError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(AuthError::Store),
        Err(_) => Err(AuthError::StoreTimeout(timeout)),
    }
}
