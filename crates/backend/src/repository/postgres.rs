use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::pooled_connection::deadpool::PoolError;

use super::{RepositoryError, RepositoryResult, UserFilter, UserRepository};
use crate::db::{self, DbConnection, DbPool};
use crate::models::{NewUser, User};

impl From<DieselError> for RepositoryError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => RepositoryError::NotFound,
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                RepositoryError::DuplicateKey
            }
            other => RepositoryError::Backend(anyhow::Error::new(other)),
        }
    }
}

impl From<PoolError> for RepositoryError {
    fn from(err: PoolError) -> Self {
        RepositoryError::Backend(anyhow::anyhow!("Database connection unavailable: {}", err))
    }
}

/// Postgres-backed user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: DbPool,
}

impl PgUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> RepositoryResult<DbConnection> {
        Ok(db::get_conn(&self.pool).await?)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<User> {
        let mut conn = self.conn().await?;
        db::users::get_by_id(&mut conn, id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<User> {
        let mut conn = self.conn().await?;
        db::users::get_by_email(&mut conn, email)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(&self, user: NewUser) -> RepositoryResult<User> {
        let mut conn = self.conn().await?;
        Ok(db::users::create(&mut conn, &user).await?)
    }

    async fn save(&self, user: User) -> RepositoryResult<User> {
        let mut conn = self.conn().await?;
        db::users::save(&mut conn, &user)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn delete_by_id(&self, id: i64) -> RepositoryResult<u64> {
        let mut conn = self.conn().await?;
        let deleted = db::users::delete(&mut conn, id).await?;
        Ok(deleted as u64)
    }

    async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<User>> {
        let mut conn = self.conn().await?;
        Ok(db::users::list(&mut conn, filter.name(), limit, offset).await?)
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        let mut conn = self.conn().await?;
        Ok(db::users::count(&mut conn, filter.name()).await?)
    }
}
