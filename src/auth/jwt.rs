//! Signed token codec (HS256).
//!
//! Two token kinds share one key:
//! - access tokens carry `sub` (email), `userId`, `nickname` and `auth` (role)
//! - refresh tokens carry only `sub`
//!
//! Every token also carries a random `jti`, so two tokens minted for the
//! same subject within the same second still differ.

use crate::auth::error::AuthError;
use crate::users::models::Role;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Minimum secret length: 256 bits for HS256.
pub const MIN_SECRET_BYTES: usize = 32;

/// Claim set of either token kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject — account email
    pub sub: String,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Role; present only on access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Role>,
    /// Token id
    pub jti: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl TokenClaims {
    pub fn is_access(&self) -> bool {
        self.auth.is_some()
    }
}

/// Verified identity of an access-token holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessClaims {
    pub user_id: i64,
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub exp: i64,
}

impl TryFrom<TokenClaims> for AccessClaims {
    type Error = AuthError;

    fn try_from(claims: TokenClaims) -> Result<Self, Self::Error> {
        let role = claims
            .auth
            .ok_or(AuthError::InvalidToken("token carries no authority claim"))?;
        let user_id = claims
            .user_id
            .ok_or(AuthError::InvalidToken("token carries no user id"))?;
        Ok(Self {
            user_id,
            email: claims.sub,
            nickname: claims.nickname.unwrap_or_default(),
            role,
            exp: claims.exp,
        })
    }
}

/// Issues and verifies tokens with one immutable HMAC key.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Build a codec from the configured secret.
    ///
    /// A secret shorter than [`MIN_SECRET_BYTES`] is a configuration error.
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        if secret.len() < MIN_SECRET_BYTES {
            anyhow::bail!(
                "jwt_secret must be at least {} bytes (got {})",
                MIN_SECRET_BYTES,
                secret.len()
            );
        }

        // Expiry is checked by hand so that expired tokens stay readable.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    pub fn issue_access_token(
        &self,
        user_id: i64,
        email: &str,
        nickname: &str,
        role: Role,
        ttl: Duration,
    ) -> Result<String, AuthError> {
        let (iat, exp) = window(ttl);
        self.sign(&TokenClaims {
            sub: email.to_string(),
            user_id: Some(user_id),
            nickname: Some(nickname.to_string()),
            auth: Some(role),
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
        })
    }

    pub fn issue_refresh_token(&self, email: &str, ttl: Duration) -> Result<String, AuthError> {
        let (iat, exp) = window(ttl);
        self.sign(&TokenClaims {
            sub: email.to_string(),
            user_id: None,
            nickname: None,
            auth: None,
            jti: Uuid::new_v4().to_string(),
            iat,
            exp,
        })
    }

    /// Verify signature, structure and expiry.
    ///
    /// Signature and structure failures are `InvalidToken`; a token that is
    /// otherwise valid but past its `exp` is `ExpiredToken`.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.decode_signed(token)?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }

    /// Verify an access token and return its identity claims.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.verify(token)?.try_into()
    }

    /// Email of a correctly signed token, expired or not.
    pub fn extract_email(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.decode_signed(token)?;
        if claims.exp <= chrono::Utc::now().timestamp() {
            tracing::debug!(email = %claims.sub, "email read from expired token");
        }
        Ok(claims.sub)
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("failed to sign token: {}", e)))
    }

    fn decode_signed(&self, token: &str) -> Result<TokenClaims, AuthError> {
        decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::InvalidSignature => "signature does not verify",
                    ErrorKind::ExpiredSignature => return AuthError::ExpiredToken,
                    ErrorKind::InvalidAlgorithm
                    | ErrorKind::MissingAlgorithm
                    | ErrorKind::InvalidAlgorithmName => "unsupported algorithm",
                    ErrorKind::MissingRequiredClaim(_) | ErrorKind::Json(_) => {
                        "unsupported claim set"
                    }
                    _ => "malformed token",
                };
                tracing::debug!(error = %e, reason, "token rejected");
                AuthError::InvalidToken(reason)
            })
    }
}

fn window(ttl: Duration) -> (i64, i64) {
    let now = chrono::Utc::now().timestamp();
    (now, now + ttl.as_secs() as i64)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-minimum-32-chars!!";
    const HOUR: Duration = Duration::from_secs(3600);

    fn codec() -> TokenCodec {
        TokenCodec::new(TEST_SECRET).expect("codec")
    }

    fn sign_raw(claims: &TokenClaims, secret: &str) -> String {
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            claims,
            &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
        )
        .expect("encode should succeed")
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(TokenCodec::new("too-short").is_err());
    }

    #[test]
    fn test_access_token_roundtrip() {
        let codec = codec();
        let token = codec
            .issue_access_token(7, "alice@x.com", "alice", Role::Admin, HOUR)
            .expect("issue");
        assert_eq!(token.split('.').count(), 3);

        let claims = codec.verify(&token).expect("verify");
        assert_eq!(claims.sub, "alice@x.com");
        assert_eq!(claims.user_id, Some(7));
        assert_eq!(claims.nickname.as_deref(), Some("alice"));
        assert_eq!(claims.auth, Some(Role::Admin));
        assert_eq!(claims.exp - claims.iat, 3600);

        let access = codec.verify_access(&token).expect("access");
        assert_eq!(access.user_id, 7);
        assert_eq!(access.role, Role::Admin);
    }

    #[test]
    fn test_refresh_token_carries_only_subject() {
        let codec = codec();
        let token = codec.issue_refresh_token("bob@x.com", HOUR).expect("issue");
        let claims = codec.verify(&token).expect("verify");
        assert_eq!(claims.sub, "bob@x.com");
        assert!(claims.user_id.is_none());
        assert!(claims.nickname.is_none());
        assert!(!claims.is_access());

        let err = codec.verify_access(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn test_tokens_minted_together_differ() {
        let codec = codec();
        let a = codec.issue_refresh_token("bob@x.com", HOUR).unwrap();
        let b = codec.issue_refresh_token("bob@x.com", HOUR).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_secret_is_invalid_not_expired() {
        let other = TokenCodec::new("wrong-secret-that-is-also-32chars!").unwrap();
        let token = other.issue_refresh_token("carol@x.com", HOUR).unwrap();
        assert!(matches!(
            codec().verify(&token),
            Err(AuthError::InvalidToken(_))
        ));

        // even when the foreign token is also expired
        let expired = other
            .issue_refresh_token("carol@x.com", Duration::ZERO)
            .unwrap();
        assert!(matches!(
            codec().verify(&expired),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected_but_readable() {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "dave@x.com".to_string(),
            user_id: None,
            nickname: None,
            auth: None,
            jti: "j-1".to_string(),
            iat: now - 7200, // issued 2h ago
            exp: now - 3600, // expired 1h ago
        };
        let token = sign_raw(&claims, TEST_SECRET);
        let codec = codec();

        assert!(matches!(codec.verify(&token), Err(AuthError::ExpiredToken)));
        assert_eq!(codec.extract_email(&token).unwrap(), "dave@x.com");
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let codec = codec();
        let token = codec
            .issue_access_token(1, "e@x.com", "eve", Role::User, Duration::ZERO)
            .unwrap();
        assert!(matches!(codec.verify(&token), Err(AuthError::ExpiredToken)));
    }

    #[test]
    fn test_malformed_token_rejected() {
        let codec = codec();
        for token in ["", "not.a.valid.jwt", "just-random-text", "a.b.c"] {
            assert!(
                matches!(codec.verify(token), Err(AuthError::InvalidToken(_))),
                "{token:?} should be invalid"
            );
        }
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            sub: "f@x.com".to_string(),
            user_id: None,
            nickname: None,
            auth: None,
            jti: "j-2".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS512),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            codec().verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_missing_subject_is_unsupported_claim_set() {
        #[derive(Serialize)]
        struct NoSub {
            jti: String,
            iat: i64,
            exp: i64,
        }
        let now = chrono::Utc::now().timestamp();
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &NoSub {
                jti: "j-3".into(),
                iat: now,
                exp: now + 60,
            },
            &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(
            codec().verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
