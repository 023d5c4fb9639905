//! Password login with signed session tokens.
//!
//! This module provides:
//! - keyed password hashing and the HS256 token codec
//! - the `token` / `user_data` session cookies
//! - `require_auth`, the gate every non-public route sits behind
//! - register, login, logout and `me` handlers

pub mod cookies;
mod handlers;
mod jwt;
mod middleware;
mod password;
pub mod types;

pub use handlers::{auth_me, login, logout, register};
pub use jwt::{TokenCodec, TokenError};
pub use middleware::{
    current_claims, extract_credential, is_public_path, require_auth, AuthClaims, Credential,
    CredentialSource, PUBLIC_PATHS,
};
pub use password::PasswordHasher;
pub use types::{AuthConfig, Claims};
