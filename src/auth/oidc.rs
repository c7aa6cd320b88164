//! Authorization-code client for the external identity providers.
//!
//! One `ProviderClient` per configured provider. Endpoints default to the
//! provider's public ones and can be overridden in `config.yaml`.
//!
//! `exchange_code` returns the userinfo payload untouched, except for
//! `naver`: its userinfo is wrapped in `response`, so the `sub` of the ID
//! token is merged in and the flat form is handed on. A Naver token
//! response without an ID token is an exchange failure.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

use crate::auth::error::AuthError;
use crate::identity::normalizer::{merge_id_token_subject, Provider, RawClaims};
use crate::ProviderConfig;

struct Endpoints {
    auth: &'static str,
    token: &'static str,
    userinfo: &'static str,
    scopes: &'static str,
}

fn default_endpoints(provider: Provider) -> Endpoints {
    match provider {
        Provider::Google => Endpoints {
            auth: "https://accounts.google.com/o/oauth2/v2/auth",
            token: "https://oauth2.googleapis.com/token",
            userinfo: "https://openidconnect.googleapis.com/v1/userinfo",
            scopes: "openid email profile",
        },
        Provider::Kakao => Endpoints {
            auth: "https://kauth.kakao.com/oauth/authorize",
            token: "https://kauth.kakao.com/oauth/token",
            userinfo: "https://kapi.kakao.com/v2/user/me",
            scopes: "openid profile_nickname profile_image account_email",
        },
        Provider::Naver => Endpoints {
            auth: "https://nid.naver.com/oauth2.0/authorize",
            token: "https://nid.naver.com/oauth2.0/token",
            userinfo: "https://openapi.naver.com/v1/nid/me",
            scopes: "openid",
        },
    }
}

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
}

pub struct ProviderClient {
    pub provider: Provider,
    auth_endpoint: String,
    token_endpoint: String,
    userinfo_endpoint: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: String,
    http_client: reqwest::Client,
}

impl ProviderClient {
    pub fn from_config(provider: Provider, config: &ProviderConfig) -> Self {
        let defaults = default_endpoints(provider);
        Self {
            provider,
            auth_endpoint: config
                .auth_endpoint
                .clone()
                .unwrap_or_else(|| defaults.auth.to_string()),
            token_endpoint: config
                .token_endpoint
                .clone()
                .unwrap_or_else(|| defaults.token.to_string()),
            userinfo_endpoint: config
                .userinfo_endpoint
                .clone()
                .unwrap_or_else(|| defaults.userinfo.to_string()),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config
                .scopes
                .clone()
                .unwrap_or_else(|| defaults.scopes.to_string()),
            http_client: reqwest::Client::new(),
        }
    }

    /// URL the browser is sent to in order to start the login.
    pub fn auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.auth_endpoint,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for the provider's raw user claims.
    pub async fn exchange_code(&self, code: &str) -> Result<RawClaims> {
        let token_response = self
            .http_client
            .post(&self.token_endpoint)
            .form(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_uri),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to request {} token", self.provider))?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response
                .text()
                .await
                .unwrap_or_else(|_| "no body".to_string());
            bail!("{} token exchange failed ({}): {}", self.provider, status, body);
        }

        let token: TokenResponse = token_response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} token response", self.provider))?;

        let userinfo_response = self
            .http_client
            .get(&self.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to request {} userinfo", self.provider))?;

        if !userinfo_response.status().is_success() {
            let status = userinfo_response.status();
            bail!("{} userinfo fetch failed ({})", self.provider, status);
        }

        let userinfo: RawClaims = userinfo_response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} userinfo response", self.provider))?;

        match self.provider {
            Provider::Naver => {
                // The account is keyed by the ID token subject, never by `response.id`.
                let id_token = token
                    .id_token
                    .as_deref()
                    .context("naver token response carries no id_token")?;
                let subject = id_token_subject(id_token)?;
                Ok(merge_id_token_subject(&subject, &userinfo))
            }
            Provider::Google | Provider::Kakao => Ok(userinfo),
        }
    }
}

/// Read `sub` from an ID token payload.
///
/// The ID token arrives over the back channel straight from the token
/// endpoint, so only its payload is read here.
pub fn id_token_subject(id_token: &str) -> Result<String> {
    let payload = id_token
        .split('.')
        .nth(1)
        .context("ID token is not a compact JWS")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("ID token payload is not base64url")?;
    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).context("ID token payload is not JSON")?;
    claims
        .get("sub")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .context("ID token has no sub claim")
}

/// Configured provider clients, keyed by provider.
#[derive(Default)]
pub struct ProviderRegistry {
    clients: HashMap<Provider, ProviderClient>,
}

impl ProviderRegistry {
    /// Build clients for the `providers` config section.
    ///
    /// A key the normalizer does not know is a configuration error.
    pub fn from_config(providers: &BTreeMap<String, ProviderConfig>) -> Result<Self> {
        let mut clients = HashMap::new();
        for (key, config) in providers {
            let provider = Provider::from_key(key)
                .map_err(|_| anyhow::anyhow!("Unsupported provider in config: {}", key))?;
            clients.insert(provider, ProviderClient::from_config(provider, config));
        }
        Ok(Self { clients })
    }

    /// Client for `key`; unknown or unconfigured keys are `UnsupportedProvider`.
    pub fn get(&self, key: &str) -> Result<&ProviderClient, AuthError> {
        let provider = Provider::from_key(key)?;
        self.clients
            .get(&provider)
            .ok_or_else(|| AuthError::UnsupportedProvider(key.to_string()))
    }

    pub fn configured(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.clients.keys().copied().collect();
        providers.sort_by_key(|p| p.key());
        providers
    }
}

// ============================================================================
// Tests
// ============================================================================
