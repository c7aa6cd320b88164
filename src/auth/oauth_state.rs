//! One-time `state` values for the authorization-code redirect.
//!
//! `issue` mints a random value bound to the provider the browser is sent
//! to; the callback must present it back to `consume` before the TTL runs
//! out. A value is accepted once, and only for the provider it was issued for.

use crate::auth::error::AuthError;
use crate::identity::normalizer::Provider;
use moka::future::Cache;
use std::time::Duration;
use uuid::Uuid;

pub struct AuthorizationStates {
    pending: Cache<String, Provider>,
}

impl AuthorizationStates {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let pending = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { pending }
    }

    /// Mint a fresh state for a login through `provider`.
    pub async fn issue(&self, provider: Provider) -> String {
        let state = Uuid::new_v4().simple().to_string();
        self.pending.insert(state.clone(), provider).await;
        state
    }

    /// Accept `state` for `provider` exactly once.
    pub async fn consume(&self, state: &str, provider: Provider) -> Result<(), AuthError> {
        match self.pending.remove(state).await {
            Some(issued_for) if issued_for == provider => Ok(()),
            Some(issued_for) => {
                tracing::warn!(%issued_for, %provider, "authorization state used across providers");
                Err(AuthError::InvalidState)
            }
            None => {
                tracing::debug!(%provider, "unknown or expired authorization state");
                Err(AuthError::InvalidState)
            }
        }
    }
}
