//! authgate
//!
//! Token authentication service:
//! - HS256 access tokens and rotating refresh tokens
//! - Refresh sessions keyed by email with per-entry expiry
//! - Federated login through Google, Kakao and Naver, reconciled into one
//!   account per person

pub mod api;
pub mod auth;
pub mod identity;
pub mod users;

#[cfg(test)]
pub(crate) mod test_helpers;

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::api::handlers::{AppState, ServerState};
use crate::auth::cookie::should_set_secure;
use crate::auth::federated::FederatedLoginFlow;
use crate::auth::jwt::TokenCodec;
use crate::auth::oauth_state::AuthorizationStates;
use crate::auth::oidc::ProviderRegistry;
use crate::auth::password::BcryptPasswordEncoder;
use crate::auth::service::{AuthService, TokenSettings};
use crate::auth::session::MokaSessionStore;
use crate::users::memory::InMemoryUserStore;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: ServerYamlConfig,
    pub auth: AuthConfig,
    pub session: SessionYamlConfig,
    /// Provider key (`google`, `kakao`, `naver`) → client settings
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// Server configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerYamlConfig {
    pub port: u16,
    /// Public base URL; `https://` turns on `Secure` cookies
    pub public_url: Option<String>,
}

impl Default for ServerYamlConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            public_url: None,
        }
    }
}

/// Token, hashing and seeding settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret, at least 32 bytes
    pub jwt_secret: String,
    pub access_token_expiry_secs: u64,
    pub refresh_token_expiry_secs: u64,
    pub bcrypt_cost: u32,
    /// Deadline for each user-store and session-store call
    pub store_timeout_ms: u64,
    /// Frontend URL that receives federated tokens as query parameters
    pub oauth2_redirect_uri: Option<String>,
    /// Lifetime of the `state` handed out with a provider authorization URL
    pub oauth2_state_ttl_secs: u64,
    pub admin_account: Option<AdminAccountConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            access_token_expiry_secs: 1800,     // 30 minutes
            refresh_token_expiry_secs: 1_209_600, // 14 days
            bcrypt_cost: 12,
            store_timeout_ms: 2000,
            oauth2_redirect_uri: None,
            oauth2_state_ttl_secs: 600,
            admin_account: None,
        }
    }
}

/// Administrator created at startup when its email is free.
///
/// `password` may be a bcrypt digest (`$2b$...`), used as-is, or plaintext,
/// hashed at startup with a warning.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminAccountConfig {
    pub email: String,
    pub nickname: String,
    pub password: String,
}

/// Session store section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionYamlConfig {
    pub max_capacity: u64,
}

impl Default for SessionYamlConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
        }
    }
}

/// One external identity provider.
///
/// Endpoints and scopes fall back to the provider's public defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_endpoint: Option<String>,
    pub token_endpoint: Option<String>,
    pub userinfo_endpoint: Option<String>,
    pub scopes: Option<String>,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub public_url: Option<String>,
    pub auth: AuthConfig,
    pub session_max_capacity: u64,
    pub providers: BTreeMap<String, ProviderConfig>,
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let mut auth = yaml.auth;
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            auth.jwt_secret = secret;
        }
        if let Some(secs) = env_parse("ACCESS_TOKEN_EXPIRY_SECS") {
            auth.access_token_expiry_secs = secs;
        }
        if let Some(secs) = env_parse("REFRESH_TOKEN_EXPIRY_SECS") {
            auth.refresh_token_expiry_secs = secs;
        }
        if let Ok(uri) = std::env::var("OAUTH2_REDIRECT_URI") {
            auth.oauth2_redirect_uri = Some(uri).filter(|u| !u.is_empty());
        }

        Ok(Self {
            server_port: env_parse("SERVER_PORT").unwrap_or(yaml.server.port),
            public_url: std::env::var("PUBLIC_URL").ok().or(yaml.server.public_url),
            auth,
            session_max_capacity: yaml.session.max_capacity,
            providers: yaml.providers,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings {
            access_ttl: Duration::from_secs(self.auth.access_token_expiry_secs),
            refresh_ttl: Duration::from_secs(self.auth.refresh_token_expiry_secs),
            store_timeout: Duration::from_millis(self.auth.store_timeout_ms),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

// ============================================================================
// Server bootstrap
// ============================================================================

/// Wire stores, codec and flows together.
///
/// Fails on a short signing secret or an unknown provider key.
pub fn build_state(config: &Config) -> Result<AppState> {
    let codec = Arc::new(TokenCodec::new(&config.auth.jwt_secret)?);
    let users = Arc::new(InMemoryUserStore::new());
    let sessions = Arc::new(MokaSessionStore::new(config.session_max_capacity));
    let passwords = Arc::new(BcryptPasswordEncoder::new(config.auth.bcrypt_cost));

    let auth = Arc::new(AuthService::new(
        users,
        sessions,
        codec,
        passwords,
        config.token_settings(),
    ));
    let providers = Arc::new(ProviderRegistry::from_config(&config.providers)?);
    let federated = Arc::new(FederatedLoginFlow::new(auth.clone()));
    let oauth_states = Arc::new(AuthorizationStates::new(
        Duration::from_secs(config.auth.oauth2_state_ttl_secs),
        config.session_max_capacity,
    ));

    Ok(Arc::new(ServerState {
        auth,
        federated,
        providers,
        oauth_states,
        oauth2_redirect_uri: config.auth.oauth2_redirect_uri.clone(),
        secure_cookies: should_set_secure(config.public_url.as_deref()),
    }))
}

/// Build the state, seed the administrator and serve until Ctrl-C.
pub async fn start_server(config: Config) -> Result<()> {
    let state = build_state(&config)?;

    if let Some(ref admin) = config.auth.admin_account {
        state
            .auth
            .seed_admin(&admin.email, &admin.nickname, &admin.password)
            .await?;
    }

    let configured: Vec<&str> = state.providers.configured().iter().map(|p| p.key()).collect();
    tracing::info!(providers = ?configured, "identity providers configured");

    let app = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.server_port)).await?;
    tracing::info!("authgate listening on port {}", config.server_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
