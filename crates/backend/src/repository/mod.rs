//! Durable user storage.
//!
//! [`UserRepository`] is the seam between the user store and whatever
//! actually persists users. The durable store is the only authority on
//! email uniqueness; implementations report a violated constraint as
//! [`RepositoryError::DuplicateKey`] rather than checking ahead of time.
//!
//! Two implementations ship with the backend:
//! - [`PgUserRepository`]: Postgres through diesel-async
//! - [`MemoryUserRepository`]: in-process tables for development and tests

mod memory;
mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewUser, User};

pub use memory::MemoryUserRepository;
pub use postgres::PgUserRepository;

/// Errors reported by a durable store.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("duplicate key")]
    DuplicateKey,

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Filter applied to listing and counting users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    /// Substring match on the user's name.
    pub name: Option<String>,
}

impl UserFilter {
    pub fn by_name(name: impl Into<String>) -> Self {
        UserFilter {
            name: Some(name.into()),
        }
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

/// CRUD operations against durable user storage.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<User>;

    async fn find_by_email(&self, email: &str) -> RepositoryResult<User>;

    /// Insert a new user, returning it with its assigned id.
    async fn insert(&self, user: NewUser) -> RepositoryResult<User>;

    /// Persist every mutable field of an existing user.
    async fn save(&self, user: User) -> RepositoryResult<User>;

    /// Returns the number of rows removed.
    async fn delete_by_id(&self, id: i64) -> RepositoryResult<u64>;

    /// Users ordered by name. A non-positive `limit` means no limit.
    async fn list(&self, filter: &UserFilter, limit: i64, offset: i64)
        -> RepositoryResult<Vec<User>>;

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64>;
}
