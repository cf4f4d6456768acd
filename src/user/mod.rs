pub mod auth;
mod user_manager;

pub use auth::{AuthToken, AuthTokenValue, PasswordHasherKind};
pub use user_manager::UserManager;
