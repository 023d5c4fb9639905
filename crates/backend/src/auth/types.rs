//! Auth-related types and configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub id: i64,
    /// User display name
    pub name: String,
    /// User email
    pub email: String,
    /// Issued at timestamp
    pub iat: i64,
    /// Expiration timestamp
    pub exp: i64,
}

/// Auth configuration loaded from environment
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub hash_secret: String,
    pub token_duration_hours: i64,
    pub cookie_max_age_secs: i64,
}

impl AuthConfig {
    /// Load auth configuration from environment variables.
    ///
    /// Required env vars:
    /// - `JWT_SECRET`: Secret key for signing JWTs
    /// - `HASH_SECRET`: Key for the keyed password hash
    ///
    /// Optional:
    /// - `TOKEN_TTL_HOURS` (default 24)
    /// - `COOKIE_MAX_AGE_SECS` (default 3600)
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let hash_secret = std::env::var("HASH_SECRET").context("HASH_SECRET must be set")?;

        let config = Self {
            jwt_secret,
            hash_secret,
            token_duration_hours: crate::config::env_or("TOKEN_TTL_HOURS", 24)?,
            cookie_max_age_secs: crate::config::env_or("COOKIE_MAX_AGE_SECS", 3600)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() || self.hash_secret.is_empty() {
            bail!("JWT_SECRET and HASH_SECRET cannot be empty");
        }
        // Login tokens are signed with the JWT key only, never the hash key
        if self.jwt_secret == self.hash_secret {
            bail!("JWT_SECRET and HASH_SECRET must differ");
        }
        if self.token_duration_hours <= 0 {
            bail!("TOKEN_TTL_HOURS must be positive");
        }
        Ok(())
    }
}
