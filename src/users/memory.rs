//! In-memory implementation of UserStore.
//!
//! Keeps accounts in a `tokio::sync::RwLock<HashMap<i64, User>>` and checks
//! the uniqueness invariants under the write lock, so concurrent saves
//! behave like transactions against a relational store.

use crate::users::models::User;
use crate::users::store::{Constraint, UniqueViolation, UserStore};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;

pub struct InMemoryUserStore {
    users: RwLock<HashMap<i64, User>>,
    next_id: AtomicI64,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    fn check_unique(users: &HashMap<i64, User>, candidate: &User) -> Result<(), UniqueViolation> {
        for (index, identity) in candidate.identities.iter().enumerate() {
            let repeated = candidate.identities[..index]
                .iter()
                .any(|other| other.provider == identity.provider);
            if repeated {
                return Err(UniqueViolation {
                    constraint: Constraint::UserProvider,
                });
            }
        }

        for existing in users.values().filter(|u| u.id != candidate.id) {
            if existing.email == candidate.email {
                return Err(UniqueViolation {
                    constraint: Constraint::Email,
                });
            }
            let subject_taken = candidate.identities.iter().any(|ci| {
                ci.provider_id.is_some()
                    && existing
                        .identities
                        .iter()
                        .any(|ei| ei.provider == ci.provider && ei.provider_id == ci.provider_id)
            });
            if subject_taken {
                return Err(UniqueViolation {
                    constraint: Constraint::ProviderSubject,
                });
            }
        }
        Ok(())
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_provider_and_provider_id(
        &self,
        provider: &str,
        provider_id: &str,
    ) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| {
                u.identities.iter().any(|i| {
                    i.provider == provider && i.provider_id.as_deref() == Some(provider_id)
                })
            })
            .cloned())
    }

    async fn exists_by_email(&self, email: &str) -> Result<bool> {
        Ok(self.users.read().await.values().any(|u| u.email == email))
    }

    async fn exists_by_nickname(&self, nickname: &str) -> Result<bool> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .any(|u| u.nickname == nickname))
    }

    async fn save(&self, mut user: User) -> Result<User> {
        let mut users = self.users.write().await;
        Self::check_unique(&users, &user)?;

        if user.is_persisted() {
            if !users.contains_key(&user.id) {
                anyhow::bail!("user {} does not exist", user.id);
            }
            user.updated_at = Utc::now();
        } else {
            user.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.users.write().await.remove(&id);
        Ok(())
    }
}
