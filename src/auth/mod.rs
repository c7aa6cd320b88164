//! Authentication core.
//!
//! - `jwt`: HS256 token codec
//! - `session`: refresh-token sessions keyed by email
//! - `password`: bcrypt password encoder
//! - `service`: sign-up, login, refresh with rotation, logout
//! - `federated`: provider-callback login
//! - `oidc`: authorization-code client per provider
//! - `oauth_state`: one-time `state` values for the provider redirect
//! - `middleware` / `extractor` / `cookie`: HTTP glue

pub mod cookie;
pub mod error;
pub mod extractor;
pub mod federated;
pub mod jwt;
pub mod middleware;
pub mod oauth_state;
pub mod oidc;
pub mod password;
pub mod service;
pub mod session;

pub use error::AuthError;
pub use service::{AuthService, TokenPair, TokenSettings};
