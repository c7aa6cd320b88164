//! Provider-callback login: normalize → reconcile → issue tokens.

use crate::auth::error::{within, AuthError};
use crate::auth::service::{AuthService, TokenPair};
use crate::identity::normalizer::{Provider, RawClaims};
use crate::identity::reconciler::{IdentityReconciler, Resolution};
use crate::users::models::UserResponse;
use std::sync::Arc;

/// Outcome of a completed federated login.
#[derive(Debug, Clone)]
pub struct FederatedLogin {
    pub user: UserResponse,
    pub tokens: TokenPair,
    pub resolution: Resolution,
}

pub struct FederatedLoginFlow {
    reconciler: IdentityReconciler,
    auth: Arc<AuthService>,
}

impl FederatedLoginFlow {
    pub fn new(auth: Arc<AuthService>) -> Self {
        let reconciler =
            IdentityReconciler::new(auth.users().clone(), auth.settings().store_timeout);
        Self { reconciler, auth }
    }

    /// Finish a login for the provider `provider_key` with its raw claims.
    ///
    /// No password is checked; the provider vouched for the identity.
    pub async fn complete(
        &self,
        provider_key: &str,
        claims: &RawClaims,
    ) -> Result<FederatedLogin, AuthError> {
        let provider = Provider::from_key(provider_key)?;
        let identity = provider.normalize(claims);
        let reconciled = self.reconciler.reconcile(&identity).await?;

        let user = within(
            self.auth.settings().store_timeout,
            self.auth
                .users()
                .find_by_email_with_identities(&reconciled.user.email),
        )
        .await?
        .ok_or(AuthError::UserNotFound)?;

        let tokens = self.auth.issue_tokens(&user).await?;
        tracing::info!(
            user_id = user.id,
            provider = %provider,
            path = reconciled.resolution.as_str(),
            "federated login completed"
        );

        Ok(FederatedLogin {
            user: UserResponse::from(&user),
            tokens,
            resolution: reconciled.resolution,
        })
    }
}

/// Frontend URL carrying the token pair as query parameters.
pub fn redirect_url(base: &str, tokens: &TokenPair) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}accessToken={}&refreshToken={}",
        base,
        separator,
        urlencoding::encode(&tokens.access_token),
        urlencoding::encode(&tokens.refresh_token),
    )
}
