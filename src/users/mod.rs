//! User accounts and their identities, plus the store interface.

pub mod memory;
pub mod models;
pub mod store;

pub use memory::InMemoryUserStore;
pub use models::{Identity, Role, User, UserResponse, LOCAL_PROVIDER};
pub use store::{Constraint, UniqueViolation, UserStore};
