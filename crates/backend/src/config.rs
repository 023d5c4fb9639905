//! Environment-driven configuration, loaded once at startup.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};

use crate::auth::AuthConfig;
use crate::cache::{DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};

/// Read `key`, falling back to `default` when unset or empty.
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Ok(StorageBackend::Postgres),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// `None` means permissive CORS.
    pub cors_allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub tls: bool,
    pub pool_size: usize,
    pub backend: StorageBackend,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub auth: AuthConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let listen_addr: SocketAddr = env_or(
            "LISTEN_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;

        let cors_allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS").ok().map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        let backend = env_or("STORAGE_BACKEND", StorageBackend::Postgres)?;
        let url = std::env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if backend == StorageBackend::Postgres && url.is_none() {
            bail!("DATABASE_URL must be set when STORAGE_BACKEND=postgres");
        }

        let database = DatabaseConfig {
            url,
            tls: env_or("DATABASE_TLS", false)?,
            pool_size: env_or("DATABASE_POOL_SIZE", 10)?,
            backend,
        };

        let cache = CacheConfig {
            ttl: Duration::from_secs(env_or("USER_CACHE_TTL_SECS", DEFAULT_TTL.as_secs())?),
            sweep_interval: Duration::from_secs(env_or(
                "USER_CACHE_SWEEP_SECS",
                DEFAULT_SWEEP_INTERVAL.as_secs(),
            )?),
        };
        if cache.ttl.is_zero() || cache.sweep_interval.is_zero() {
            bail!("USER_CACHE_TTL_SECS and USER_CACHE_SWEEP_SECS must be positive");
        }

        let auth = AuthConfig::from_env().context("invalid auth configuration")?;

        Ok(AppConfig {
            server: ServerConfig {
                listen_addr,
                cors_allowed_origins,
            },
            database,
            cache,
            auth,
        })
    }
}
