//! Test helper factories and mock state builders
//!
//! Builds services and server state over in-memory stores with a cheap
//! bcrypt cost.
#![allow(dead_code)]

use crate::api::handlers::{AppState, ServerState};
use crate::auth::federated::FederatedLoginFlow;
use crate::auth::jwt::TokenCodec;
use crate::auth::oauth_state::AuthorizationStates;
use crate::auth::oidc::ProviderRegistry;
use crate::auth::password::BcryptPasswordEncoder;
use crate::auth::service::{AuthService, TokenSettings};
use crate::auth::session::MokaSessionStore;
use crate::users::memory::InMemoryUserStore;
use crate::users::store::UserStore;
use crate::ProviderConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";

// ============================================================================
// Service builders
// ============================================================================

/// Auth service over a fresh in-memory user store, returned alongside it.
pub fn test_auth_service() -> (Arc<AuthService>, Arc<InMemoryUserStore>) {
    let users = Arc::new(InMemoryUserStore::new());
    let auth = test_auth_service_with_users(users.clone(), TokenSettings::default());
    (auth, users)
}

pub fn test_auth_service_with_users(
    users: Arc<dyn UserStore>,
    settings: TokenSettings,
) -> Arc<AuthService> {
    Arc::new(AuthService::new(
        users,
        Arc::new(MokaSessionStore::new(1000)),
        Arc::new(TokenCodec::new(TEST_SECRET).expect("test codec")),
        Arc::new(BcryptPasswordEncoder::new(4)),
        settings,
    ))
}

/// Provider settings pointing every endpoint at `base` (a mock server).
pub fn test_provider_config(base: &str) -> ProviderConfig {
    ProviderConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        redirect_uri: "http://localhost:8080/api/auth/oauth2/callback".to_string(),
        auth_endpoint: Some(format!("{}/authorize", base)),
        token_endpoint: Some(format!("{}/token", base)),
        userinfo_endpoint: Some(format!("{}/userinfo", base)),
        scopes: None,
    }
}

// ============================================================================
// Mock state builders
// ============================================================================

/// Server state with no providers and JSON federated responses
pub fn test_server_state() -> AppState {
    test_server_state_with(BTreeMap::new(), None)
}

pub fn test_server_state_with(
    providers: BTreeMap<String, ProviderConfig>,
    oauth2_redirect_uri: Option<String>,
) -> AppState {
    let (auth, _) = test_auth_service();
    let providers = ProviderRegistry::from_config(&providers).expect("test providers");
    Arc::new(ServerState {
        federated: Arc::new(FederatedLoginFlow::new(auth.clone())),
        auth,
        providers: Arc::new(providers),
        oauth_states: Arc::new(AuthorizationStates::new(Duration::from_secs(600), 1000)),
        oauth2_redirect_uri,
        secure_cookies: false,
    })
}
