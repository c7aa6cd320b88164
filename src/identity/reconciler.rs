//! Find-or-create of the account owning an external identity.
//!
//! Resolution order:
//! 1. an identity with the same `(provider, provider_id)` exists → that user
//!    (display name refreshed when the provider sent one)
//! 2. a user with the same email exists → attach the identity to it
//! 3. otherwise → create a `USER` account holding the identity

use crate::auth::error::{within, AuthError};
use crate::identity::normalizer::CanonicalIdentity;
use crate::users::models::{federated_nickname, User};
use crate::users::store::UserStore;
use std::sync::Arc;
use std::time::Duration;

/// Which branch of the resolution produced the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Recognised,
    Linked,
    Created,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Recognised => "recognised",
            Resolution::Linked => "linked",
            Resolution::Created => "created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub user: User,
    pub resolution: Resolution,
}

pub struct IdentityReconciler {
    users: Arc<dyn UserStore>,
    store_timeout: Duration,
}

impl IdentityReconciler {
    pub fn new(users: Arc<dyn UserStore>, store_timeout: Duration) -> Self {
        Self {
            users,
            store_timeout,
        }
    }

    /// Resolve `identity` to exactly one persisted user.
    ///
    /// A concurrent first sign-in with the same email or subject makes the
    /// losing write fail its uniqueness check; the resolution is then run
    /// once more and lands on the winner's account.
    pub async fn reconcile(&self, identity: &CanonicalIdentity) -> Result<Reconciled, AuthError> {
        match self.resolve(identity).await {
            Err(AuthError::DuplicateEmail(_)) | Err(AuthError::DuplicateIdentity { .. }) => {
                tracing::debug!(provider = %identity.provider, "reconciliation raced, retrying");
                self.resolve(identity).await
            }
            other => other,
        }
    }

    async fn resolve(&self, identity: &CanonicalIdentity) -> Result<Reconciled, AuthError> {
        let provider = identity.provider.key();
        let provider_id = identity
            .provider_id
            .as_deref()
            .ok_or(AuthError::MissingClaim("providerId"))?;

        let known = within(
            self.store_timeout,
            self.users
                .find_by_provider_and_provider_id(provider, provider_id),
        )
        .await?;

        if let Some(mut user) = known {
            if user.apply_display_name(identity.name.as_deref()) {
                user = self.save(user, provider).await?;
            }
            tracing::info!(user_id = user.id, provider, "federated identity recognised");
            return Ok(Reconciled {
                user,
                resolution: Resolution::Recognised,
            });
        }

        let email = identity
            .email
            .as_deref()
            .ok_or(AuthError::MissingClaim("email"))?;

        let by_email = within(self.store_timeout, self.users.find_by_email(email)).await?;
        if let Some(mut user) = by_email {
            user.attach_identity(provider, provider_id)?;
            let user = self.save(user, provider).await?;
            tracing::info!(user_id = user.id, provider, "federated identity linked");
            return Ok(Reconciled {
                user,
                resolution: Resolution::Linked,
            });
        }

        let nickname = federated_nickname(identity.name.as_deref(), email);
        let user = User::new_federated(email, &nickname, provider, provider_id)?;
        let user = self.save(user, provider).await?;
        tracing::info!(user_id = user.id, %email, provider, "federated user created");
        Ok(Reconciled {
            user,
            resolution: Resolution::Created,
        })
    }

    async fn save(&self, user: User, provider: &str) -> Result<User, AuthError> {
        let email = user.email.clone();
        within(self.store_timeout, self.users.save(user))
            .await
            .map_err(|e| e.or_unique(&email, provider))
    }
}
