//! Refresh-token sessions, keyed by email.
//!
//! One live session per email. Writes are unconditional upserts, so two
//! concurrent refreshes for the same account resolve last-writer-wins.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Server-side record of the current refresh token for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSession {
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// Lifetime handed to the store's own expiry mechanism
    pub ttl_secs: u64,
}

impl RefreshSession {
    pub fn new(email: &str, token: String, ttl: Duration) -> Self {
        Self {
            email: email.to_string(),
            token,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl.as_secs() as i64),
            ttl_secs: ttl.as_secs(),
        }
    }

    /// Replace the token, restarting the lifetime.
    pub fn rotate(self, token: String, ttl: Duration) -> Self {
        Self::new(&self.email, token, ttl)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    /// Exact comparison against a presented token.
    pub fn matches(&self, token: &str) -> bool {
        self.token.as_bytes() == token.as_bytes()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or overwrite the session of `session.email`.
    async fn put(&self, session: RefreshSession) -> Result<()>;

    /// Current session, or `None` when absent or expired.
    async fn get(&self, email: &str) -> Result<Option<RefreshSession>>;

    /// Remove the session. Removing an absent session is not an error.
    async fn delete(&self, email: &str) -> Result<()>;
}

/// Expire each entry after the TTL recorded in the entry itself.
struct SessionExpiry;

impl Expiry<String, RefreshSession> for SessionExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &RefreshSession,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &RefreshSession,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl())
    }
}

/// In-process session store backed by a moka cache.
pub struct MokaSessionStore {
    cache: Cache<String, RefreshSession>,
}

impl MokaSessionStore {
    pub fn new(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(SessionExpiry)
            .build();
        Self { cache }
    }
}

#[async_trait]
impl SessionStore for MokaSessionStore {
    async fn put(&self, session: RefreshSession) -> Result<()> {
        self.cache.insert(session.email.clone(), session).await;
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<RefreshSession>> {
        match self.cache.get(email).await {
            Some(session) if session.is_expired() => {
                self.cache.invalidate(email).await;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, email: &str) -> Result<()> {
        self.cache.invalidate(email).await;
        Ok(())
    }
}
