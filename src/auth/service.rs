//! Local-credential flows: sign-up, login, refresh with rotation, logout.
//!
//! Every flow takes the caller identity explicitly; nothing here reads an
//! ambient "current user". Store calls run under `TokenSettings::store_timeout`.

use crate::auth::error::{within, AuthError};
use crate::auth::jwt::TokenCodec;
use crate::auth::password::{is_bcrypt_digest, PasswordEncoder};
use crate::auth::session::{RefreshSession, SessionStore};
use crate::users::models::{
    validate_email, validate_nickname, validate_password, Role, User, UserResponse,
    LOCAL_PROVIDER,
};
use crate::users::store::UserStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Lifetimes and deadlines applied by the flows.
#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub store_timeout: Duration,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            access_ttl: Duration::from_secs(1800),
            refresh_ttl: Duration::from_secs(1_209_600),
            store_timeout: Duration::from_secs(2),
        }
    }
}

/// Access + refresh token pair handed to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
    passwords: Arc<dyn PasswordEncoder>,
    settings: TokenSettings,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        sessions: Arc<dyn SessionStore>,
        codec: Arc<TokenCodec>,
        passwords: Arc<dyn PasswordEncoder>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            users,
            sessions,
            codec,
            passwords,
            settings,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Create a password account.
    ///
    /// Input format is checked first, then email uniqueness, then nickname
    /// uniqueness.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        nickname: &str,
    ) -> Result<UserResponse, AuthError> {
        validate_email(email)?;
        validate_nickname(nickname)?;
        validate_password(password)?;

        let timeout = self.settings.store_timeout;
        if within(timeout, self.users.exists_by_email(email)).await? {
            return Err(AuthError::DuplicateEmail(email.to_string()));
        }
        let nickname = nickname.trim();
        if within(timeout, self.users.exists_by_nickname(nickname)).await? {
            return Err(AuthError::DuplicateNickname(nickname.to_string()));
        }

        let digest = self.passwords.hash(password).map_err(AuthError::Internal)?;
        let user = User::new_local(email, nickname, digest, Role::User)?;
        let user = within(timeout, self.users.save(user))
            .await
            .map_err(|e| e.or_unique(email, LOCAL_PROVIDER))?;

        tracing::info!(user_id = user.id, %email, %nickname, "user signed up");
        Ok(UserResponse::from(&user))
    }

    /// Password login.
    ///
    /// Unknown email, an account without a local identity and a wrong
    /// password are indistinguishable to the caller.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let user = within(
            self.settings.store_timeout,
            self.users.find_by_email_with_identities(email),
        )
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let digest = user
            .local_identity()
            .and_then(|identity| identity.password_hash.as_deref())
            .ok_or(AuthError::InvalidCredentials)?;

        if !self.passwords.matches(password, digest) {
            tracing::debug!(user_id = user.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_tokens(&user).await?;
        tracing::info!(user_id = user.id, %email, "user logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, rotating the stored session.
    ///
    /// Only the token currently stored for the account is accepted, so a
    /// token that was rotated away (or logged out) fails as `InvalidToken`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.codec.verify(refresh_token)?;
        let email = claims.sub;
        let timeout = self.settings.store_timeout;

        let session = within(timeout, self.sessions.get(&email))
            .await?
            .ok_or_else(|| {
                tracing::warn!(%email, "refresh without a live session");
                AuthError::InvalidToken("no session")
            })?;

        if !session.matches(refresh_token) {
            tracing::warn!(%email, "refresh token mismatch (possible replay)");
            return Err(AuthError::InvalidToken("mismatch"));
        }

        let user = within(timeout, self.users.find_by_email(&email))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let pair = self.mint_pair(&user)?;
        let rotated = session.rotate(pair.refresh_token.clone(), self.settings.refresh_ttl);
        within(timeout, self.sessions.put(rotated)).await?;
        tracing::info!(user_id = user.id, %email, "refresh token rotated");
        Ok(pair)
    }

    /// Drop the session of `email`. Logging out twice is not an error.
    pub async fn logout(&self, email: &str) -> Result<(), AuthError> {
        within(self.settings.store_timeout, self.sessions.delete(email)).await?;
        tracing::info!(%email, "user logged out");
        Ok(())
    }

    /// Public view of the account `user_id`.
    pub async fn current_user(&self, user_id: i64) -> Result<UserResponse, AuthError> {
        within(self.settings.store_timeout, self.users.find_by_id(user_id))
            .await?
            .map(|user| UserResponse::from(&user))
            .ok_or(AuthError::UserNotFound)
    }

    /// Mint a pair for `user` and make its refresh token the live session.
    ///
    /// Shared by password login and federated login; refresh rotates the
    /// existing session instead.
    pub(crate) async fn issue_tokens(&self, user: &User) -> Result<TokenPair, AuthError> {
        let pair = self.mint_pair(user)?;
        let session = RefreshSession::new(
            &user.email,
            pair.refresh_token.clone(),
            self.settings.refresh_ttl,
        );
        within(self.settings.store_timeout, self.sessions.put(session)).await?;
        Ok(pair)
    }

    fn mint_pair(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access_token = self.codec.issue_access_token(
            user.id,
            &user.email,
            &user.nickname,
            user.role,
            self.settings.access_ttl,
        )?;
        let refresh_token = self
            .codec
            .issue_refresh_token(&user.email, self.settings.refresh_ttl)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Create the configured administrator unless its email is taken.
    ///
    /// `secret` is either a bcrypt digest or a plaintext password.
    pub async fn seed_admin(
        &self,
        email: &str,
        nickname: &str,
        secret: &str,
    ) -> Result<Option<UserResponse>, AuthError> {
        let timeout = self.settings.store_timeout;
        if within(timeout, self.users.exists_by_email(email)).await? {
            tracing::debug!(%email, "admin account already present");
            return Ok(None);
        }

        let digest = if is_bcrypt_digest(secret) {
            secret.to_string()
        } else {
            tracing::warn!(%email, "admin password configured in plaintext, hashing at startup");
            self.passwords.hash(secret).map_err(AuthError::Internal)?
        };

        let admin = User::new_local(email, nickname, digest, Role::Admin)?;
        let admin = within(timeout, self.users.save(admin))
            .await
            .map_err(|e| e.or_unique(email, LOCAL_PROVIDER))?;
        tracing::info!(user_id = admin.id, %email, "admin account created");
        Ok(Some(UserResponse::from(&admin)))
    }
}

// ============================================================================
// Tests
// ============================================================================
