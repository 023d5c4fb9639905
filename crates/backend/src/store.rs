//! User store: the durable repository fronted by the user cache.
//!
//! Lookups are read-through. Mutations hit the repository first and only
//! touch the cache once the durable call has succeeded.

use std::sync::Arc;

use record_types::PaginatedUsers;
use thiserror::Error;

use crate::cache::UserCache;
use crate::models::{NewUser, User};
use crate::repository::{RepositoryError, UserFilter, UserRepository};

pub const DEFAULT_PAGE_LIMIT: i64 = 30;
pub const MAX_PAGE_LIMIT: i64 = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found")]
    NotFound,

    #[error("user already exists")]
    AlreadyExists,

    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

impl From<RepositoryError> for StoreError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => StoreError::NotFound,
            RepositoryError::DuplicateKey => StoreError::AlreadyExists,
            RepositoryError::Backend(e) => StoreError::Storage(e),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct UserStore {
    repository: Arc<dyn UserRepository>,
    cache: Arc<UserCache>,
}

impl UserStore {
    pub fn new(repository: Arc<dyn UserRepository>, cache: Arc<UserCache>) -> Self {
        Self { repository, cache }
    }

    pub fn cache(&self) -> &Arc<UserCache> {
        &self.cache
    }

    /// `Ok(None)` when no such user exists.
    pub async fn get_by_id(&self, id: i64) -> StoreResult<Option<User>> {
        if let Some(user) = self.cache.get_by_id(id) {
            return Ok(Some(user));
        }
        let found = absent_as_none(self.repository.find_by_id(id).await)?;
        if let Some(user) = &found {
            self.cache.put(user.clone());
        }
        Ok(found)
    }

    pub async fn get_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        if let Some(user) = self.cache.get_by_email(email) {
            return Ok(Some(user));
        }
        let found = absent_as_none(self.repository.find_by_email(email).await)?;
        if let Some(user) = &found {
            self.cache.put(user.clone());
        }
        Ok(found)
    }

    pub async fn create(&self, new_user: NewUser) -> StoreResult<User> {
        let email = new_user.email.clone();
        let user = self.repository.insert(new_user).await.map_err(|e| {
            if matches!(e, RepositoryError::DuplicateKey) {
                tracing::debug!("Create rejected, email already registered: {}", email);
            }
            StoreError::from(e)
        })?;
        self.cache.put(user.clone());
        Ok(user)
    }

    pub async fn update(&self, user: User) -> StoreResult<User> {
        let id = user.id;
        let saved = self.repository.save(user).await?;
        self.cache.invalidate(id);
        Ok(saved)
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let rows = self.repository.delete_by_id(id).await?;
        if rows == 0 {
            return Err(StoreError::NotFound);
        }
        self.cache.invalidate(id);
        Ok(())
    }

    /// One page of users; `limit` and `page` fall back to 30 and 1 when
    /// missing or non-positive. `limit` is capped at [`MAX_PAGE_LIMIT`].
    pub async fn list_page(
        &self,
        filter: &UserFilter,
        limit: Option<i64>,
        page: Option<i64>,
    ) -> StoreResult<PaginatedUsers> {
        let limit = limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .min(MAX_PAGE_LIMIT);
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let offset = (page - 1).saturating_mul(limit);

        let total_count = self.repository.count(filter).await?;
        let users = self.repository.list(filter, limit, offset).await?;

        let total_count = total_count.max(0);
        let total_pages = total_count / limit + i64::from(total_count % limit != 0);
        Ok(PaginatedUsers {
            users: users.into_iter().map(Into::into).collect(),
            total_count,
            total_pages,
            page,
            limit,
            has_more: page < total_pages,
        })
    }
}

fn absent_as_none(result: Result<User, RepositoryError>) -> StoreResult<Option<User>> {
    match result {
        Ok(user) => Ok(Some(user)),
        Err(RepositoryError::NotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
