//! User accounts and their role memberships.

mod model;
mod repository;

pub use model::{Role, SENDER_ROLE_PRIORITY, UserAccount};
pub use repository::UserRepository;
