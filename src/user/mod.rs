pub mod auth;

pub use auth::{AuthToken, AuthTokenValue, PasswordHasherKind};
