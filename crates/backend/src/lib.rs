//! Record services backend: user accounts behind a token-authenticated
//! HTTP API, with an in-memory user cache in front of durable storage.

use std::sync::Arc;

use anyhow::anyhow;

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;
pub mod store;

use auth::{AuthConfig, PasswordHasher, TokenCodec};
use store::UserStore;

/// Shared state handed to every handler and to the auth gate.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub tokens: Arc<TokenCodec>,
    pub passwords: Arc<PasswordHasher>,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    pub fn new(users: UserStore, auth_config: &AuthConfig) -> anyhow::Result<Self> {
        auth_config.validate()?;

        let tokens = TokenCodec::new(
            &auth_config.jwt_secret,
            chrono::Duration::hours(auth_config.token_duration_hours),
        );
        let passwords = PasswordHasher::new(&auth_config.hash_secret)
            .map_err(|e| anyhow!("HASH_SECRET is not a usable HMAC key: {}", e))?;

        Ok(AppState {
            users: Arc::new(users),
            tokens: Arc::new(tokens),
            passwords: Arc::new(passwords),
            auth_config: Arc::new(auth_config.clone()),
        })
    }
}
