//! Adaptive password hashing.

use anyhow::{Context, Result};

pub trait PasswordEncoder: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String>;

    /// Whether `raw` matches `digest`. A malformed digest never matches.
    fn matches(&self, raw: &str, digest: &str) -> bool;
}

/// bcrypt with a configurable work factor.
#[derive(Debug, Clone)]
pub struct BcryptPasswordEncoder {
    cost: u32,
}

impl BcryptPasswordEncoder {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptPasswordEncoder {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordEncoder for BcryptPasswordEncoder {
    fn hash(&self, raw: &str) -> Result<String> {
        bcrypt::hash(raw, self.cost).context("Failed to hash password")
    }

    fn matches(&self, raw: &str, digest: &str) -> bool {
        bcrypt::verify(raw, digest).unwrap_or(false)
    }
}

/// Whether a configured secret already is a bcrypt digest.
pub fn is_bcrypt_digest(value: &str) -> bool {
    value.len() == 60 && ["$2a$", "$2b$", "$2y$"].iter().any(|p| value.starts_with(p))
}
