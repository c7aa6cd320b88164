//! External identities: claim normalization and account reconciliation.

pub mod normalizer;
pub mod reconciler;

pub use normalizer::{normalize, CanonicalIdentity, Provider, RawClaims};
pub use reconciler::{IdentityReconciler, Reconciled, Resolution};
