//! UserStore trait definition
//!
//! Abstract interface over the user-record store. Lookups return `Option`
//! for "not found"; `Err` is reserved for store failures.

use crate::users::models::User;
use anyhow::Result;
use async_trait::async_trait;

/// Unique constraint violated by a `save`.
///
/// Stores return it inside the `anyhow::Error` so the auth core can
/// downcast it into a domain error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unique constraint violated: {constraint}")]
pub struct UniqueViolation {
    pub constraint: Constraint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// `users.email`
    Email,
    /// `(provider, provider_id)` across all identities
    ProviderSubject,
    /// `(user, provider)` within one account
    UserProvider,
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Constraint::Email => "users.email",
            Constraint::ProviderSubject => "identities.provider_provider_id",
            Constraint::UserProvider => "identities.user_provider",
        })
    }
}

/// Abstract interface for user-record operations.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Get a user by internal ID
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get a user by email
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Get a user by email with the identity set loaded.
    ///
    /// Backends that load identities lazily override this; the default
    /// delegates to `find_by_email`.
    async fn find_by_email_with_identities(&self, email: &str) -> Result<Option<User>> {
        self.find_by_email(email).await
    }

    /// Get the user owning the identity `(provider, provider_id)`
    async fn find_by_provider_and_provider_id(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>>;

    async fn exists_by_email(&self, email: &str) -> Result<bool>;

    async fn exists_by_nickname(&self, nickname: &str) -> Result<bool>;

    /// Insert (id `0`) or replace a user together with its full identity set.
    ///
    /// Fails with [`UniqueViolation`] when the write would break one of the
    /// uniqueness invariants. Returns the stored user with its id assigned.
    async fn save(&self, user: User) -> Result<User>;

    /// Delete a user and, with it, every identity it owns. Idempotent.
    async fn delete(&self, id: i64) -> Result<()>;
}
