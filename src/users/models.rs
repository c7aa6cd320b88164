//! Account model: a `User` owns its `Identity` set by value.
//!
//! An identity is one way of signing in (local password or an external
//! provider subject). Identities never point back at their user; the owning
//! `User` is the only path to them, so deleting the user drops them too.

use crate::auth::error::AuthError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Provider name of the password identity.
pub const LOCAL_PROVIDER: &str = "local";

const NICKNAME_MIN_CHARS: usize = 2;
const NICKNAME_MAX_CHARS: usize = 20;
const PASSWORD_MIN_CHARS: usize = 8;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@([A-Za-z0-9.-]+\.[A-Za-z]{2,})$").expect("email regex is valid")
});

/// Account role, serialized in tokens as `USER` / `ADMIN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authentication method bound to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// `"local"` or an external provider key (`"google"`, `"kakao"`, ...)
    pub provider: String,
    /// External subject identifier; `None` only for the local identity
    pub provider_id: Option<String>,
    /// Password digest; present only for the local identity
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Identity {
    pub fn local(password_hash: String) -> Self {
        Self {
            provider: LOCAL_PROVIDER.to_string(),
            provider_id: None,
            password_hash: Some(password_hash),
            created_at: Utc::now(),
        }
    }

    pub fn federated(provider: &str, provider_id: &str) -> Self {
        Self {
            provider: provider.to_string(),
            provider_id: Some(provider_id.to_string()),
            password_hash: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_local(&self) -> bool {
        self.provider == LOCAL_PROVIDER
    }
}

/// An account, independent of how its owner signs in.
///
/// `id` is assigned by the [`UserStore`](crate::users::UserStore) on first
/// save; an unsaved user carries `0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub identities: Vec<Identity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// New password account. Email and nickname are validated here.
    pub fn new_local(
        email: &str,
        nickname: &str,
        password_hash: String,
        role: Role,
    ) -> Result<Self, AuthError> {
        let mut user = Self::unsaved(email, nickname, role)?;
        user.identities.push(Identity::local(password_hash));
        Ok(user)
    }

    /// New account created by a first-ever federated sign-in.
    pub fn new_federated(
        email: &str,
        nickname: &str,
        provider: &str,
        provider_id: &str,
    ) -> Result<Self, AuthError> {
        let mut user = Self::unsaved(email, nickname, Role::User)?;
        user.identities
            .push(Identity::federated(provider, provider_id));
        Ok(user)
    }

    fn unsaved(email: &str, nickname: &str, role: Role) -> Result<Self, AuthError> {
        validate_email(email)?;
        validate_nickname(nickname)?;
        let now = Utc::now();
        Ok(Self {
            id: 0,
            email: email.to_string(),
            nickname: nickname.trim().to_string(),
            role,
            identities: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    pub fn local_identity(&self) -> Option<&Identity> {
        self.identities.iter().find(|i| i.is_local())
    }

    pub fn identity_for(&self, provider: &str) -> Option<&Identity> {
        self.identities.iter().find(|i| i.provider == provider)
    }

    /// Attach an external identity. A user holds at most one identity per provider.
    pub fn attach_identity(&mut self, provider: &str, provider_id: &str) -> Result<(), AuthError> {
        if self.identity_for(provider).is_some() {
            return Err(AuthError::DuplicateIdentity {
                provider: provider.to_string(),
            });
        }
        self.identities
            .push(Identity::federated(provider, provider_id));
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Overwrite the nickname with a provider-supplied display name.
    ///
    /// Blank names are ignored. Returns whether the nickname changed.
    pub fn apply_display_name(&mut self, name: Option<&str>) -> bool {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            return false;
        };
        let candidate = clamp_nickname(name);
        if validate_nickname(&candidate).is_err() || candidate == self.nickname {
            return false;
        }
        self.nickname = candidate;
        self.updated_at = Utc::now();
        true
    }
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if EMAIL_PATTERN.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidEmailFormat(email.to_string()))
    }
}

pub fn validate_nickname(nickname: &str) -> Result<(), AuthError> {
    let len = nickname.trim().chars().count();
    if (NICKNAME_MIN_CHARS..=NICKNAME_MAX_CHARS).contains(&len) {
        Ok(())
    } else {
        Err(AuthError::InvalidNicknameLength(nickname.to_string()))
    }
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length >= PASSWORD_MIN_CHARS {
        Ok(())
    } else {
        Err(AuthError::InvalidPasswordFormat { length })
    }
}

/// Cut a provider display name down to the nickname limit.
pub fn clamp_nickname(name: &str) -> String {
    name.trim().chars().take(NICKNAME_MAX_CHARS).collect()
}

/// Nickname for a first federated sign-in.
///
/// Uses the provider display name when it fits, else the email local part,
/// else a fixed placeholder.
pub fn federated_nickname(name: Option<&str>, email: &str) -> String {
    let from_name = name.map(clamp_nickname).unwrap_or_default();
    if validate_nickname(&from_name).is_ok() {
        return from_name;
    }
    let local_part = clamp_nickname(email.split('@').next().unwrap_or_default());
    if validate_nickname(&local_part).is_ok() {
        return local_part;
    }
    "member".to_string()
}

/// Public view of an account (safe to send to clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub providers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            nickname: u.nickname.clone(),
            role: u.role,
            providers: u.identities.iter().map(|i| i.provider.clone()).collect(),
            created_at: u.created_at,
        }
    }
}
