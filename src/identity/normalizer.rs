//! Provider claim maps → one canonical identity shape.
//!
//! | key      | shape                                                         |
//! |----------|---------------------------------------------------------------|
//! | `kakao`  | `id` + `kakao_account.{email, profile.{nickname, profile_image_url}}`, or flat OIDC (`sub`, `email`, `nickname`, `picture`) |
//! | `naver`  | `response.{id, email, name, profile_image}`, or the merged flat form (`sub`, `email`, `name`) |
//! | `google` | flat OIDC (`sub`, `email`, `name`, `picture`)                 |
//!
//! Missing maps or fields resolve to `None`; the normalizer never fails on
//! the shape of a payload, only on an unknown provider key.

use crate::auth::error::AuthError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Raw attribute payload as received from a provider.
pub type RawClaims = Map<String, Value>;

/// Closed set of external identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Kakao,
    Naver,
}

impl Provider {
    /// Resolve a provider key, ignoring case.
    pub fn from_key(key: &str) -> Result<Self, AuthError> {
        match key.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Provider::Google),
            "kakao" => Ok(Provider::Kakao),
            "naver" => Ok(Provider::Naver),
            _ => Err(AuthError::UnsupportedProvider(key.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Kakao => "kakao",
            Provider::Naver => "naver",
        }
    }

    /// Map this provider's payload to a [`CanonicalIdentity`].
    pub fn normalize(&self, claims: &RawClaims) -> CanonicalIdentity {
        match self {
            Provider::Google => google(claims),
            Provider::Kakao => kakao(claims),
            Provider::Naver => naver(claims),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Provider-agnostic view of an external login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalIdentity {
    pub provider: Provider,
    pub provider_id: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Normalize a payload for the provider named by `key`.
pub fn normalize(key: &str, claims: &RawClaims) -> Result<CanonicalIdentity, AuthError> {
    Ok(Provider::from_key(key)?.normalize(claims))
}

/// Fold an ID-token subject into a wrapped userinfo payload.
///
/// Produces the flat `{sub, email, name, id}` map the `naver` normalizer
/// reads when no `response` wrapper is present.
pub fn merge_id_token_subject(subject: &str, userinfo: &RawClaims) -> RawClaims {
    let body = userinfo
        .get("response")
        .and_then(Value::as_object)
        .unwrap_or(userinfo);

    let mut merged = RawClaims::new();
    merged.insert("sub".into(), Value::String(subject.to_string()));
    for field in ["email", "name", "id"] {
        if let Some(value) = body.get(field) {
            merged.insert(field.into(), value.clone());
        }
    }
    merged
}

fn google(claims: &RawClaims) -> CanonicalIdentity {
    CanonicalIdentity {
        provider: Provider::Google,
        provider_id: text_at(claims, &["sub"]),
        email: text_at(claims, &["email"]),
        name: text_at(claims, &["name"]),
        avatar_url: text_at(claims, &["picture"]),
    }
}

fn kakao(claims: &RawClaims) -> CanonicalIdentity {
    let nested = claims.contains_key("kakao_account") || !claims.contains_key("sub");
    if nested {
        CanonicalIdentity {
            provider: Provider::Kakao,
            provider_id: text_at(claims, &["id"]),
            email: text_at(claims, &["kakao_account", "email"]),
            name: text_at(claims, &["kakao_account", "profile", "nickname"]),
            avatar_url: text_at(claims, &["kakao_account", "profile", "profile_image_url"]),
        }
    } else {
        CanonicalIdentity {
            provider: Provider::Kakao,
            provider_id: text_at(claims, &["sub"]),
            email: text_at(claims, &["email"]),
            name: text_at(claims, &["nickname"]),
            avatar_url: text_at(claims, &["picture"]),
        }
    }
}

fn naver(claims: &RawClaims) -> CanonicalIdentity {
    if claims.contains_key("response") {
        CanonicalIdentity {
            provider: Provider::Naver,
            provider_id: text_at(claims, &["response", "id"]),
            email: text_at(claims, &["response", "email"]),
            name: text_at(claims, &["response", "name"]),
            avatar_url: text_at(claims, &["response", "profile_image"]),
        }
    } else {
        // merged ID-token form carries no avatar
        CanonicalIdentity {
            provider: Provider::Naver,
            provider_id: text_at(claims, &["sub"]),
            email: text_at(claims, &["email"]),
            name: text_at(claims, &["name"]),
            avatar_url: None,
        }
    }
}

/// Walk `path` through nested objects and render the leaf as text.
///
/// Numbers become decimal strings; blanks, nulls and non-scalar leaves
/// are `None`.
fn text_at(claims: &RawClaims, path: &[&str]) -> Option<String> {
    let (last, parents) = path.split_last()?;
    let mut current = claims;
    for segment in parents {
        current = current.get(*segment)?.as_object()?;
    }
    match current.get(*last)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
