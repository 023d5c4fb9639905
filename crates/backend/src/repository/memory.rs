use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{RepositoryError, RepositoryResult, UserFilter, UserRepository};
use crate::models::{NewUser, User};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    // Unique index on email, mirroring the database constraint.
    email_index: HashMap<String, i64>,
}

/// In-process user repository with the same uniqueness rules as the
/// Postgres schema. Data lives for the lifetime of the value.
#[derive(Default)]
pub struct MemoryUserRepository {
    tables: Mutex<Tables>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(filter: &UserFilter, user: &User) -> bool {
        filter.name().map_or(true, |needle| user.name.contains(needle))
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<User> {
        self.tables
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<User> {
        let tables = self.tables.lock();
        tables
            .email_index
            .get(email)
            .and_then(|id| tables.users.get(id))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn insert(&self, user: NewUser) -> RepositoryResult<User> {
        let mut tables = self.tables.lock();
        if tables.email_index.contains_key(&user.email) {
            return Err(RepositoryError::DuplicateKey);
        }

        tables.next_id += 1;
        let now = Utc::now();
        let stored = User {
            id: tables.next_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_active: user.is_active,
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        };

        tables.email_index.insert(stored.email.clone(), stored.id);
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save(&self, user: User) -> RepositoryResult<User> {
        let mut tables = self.tables.lock();
        let previous_email = match tables.users.get(&user.id) {
            Some(existing) => existing.email.clone(),
            None => return Err(RepositoryError::NotFound),
        };

        if previous_email != user.email {
            if tables.email_index.contains_key(&user.email) {
                return Err(RepositoryError::DuplicateKey);
            }
            tables.email_index.remove(&previous_email);
            tables.email_index.insert(user.email.clone(), user.id);
        }

        let created_at = tables.users[&user.id].created_at;
        let stored = User {
            created_at,
            updated_at: Utc::now(),
            ..user
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete_by_id(&self, id: i64) -> RepositoryResult<u64> {
        let mut tables = self.tables.lock();
        match tables.users.remove(&id) {
            Some(removed) => {
                tables.email_index.remove(&removed.email);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<User>> {
        let tables = self.tables.lock();
        let mut matched: Vec<User> = tables
            .users
            .values()
            .filter(|u| Self::matching(filter, u))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let skip = usize::try_from(offset.max(0)).unwrap_or(usize::MAX);
        let take = if limit > 0 {
            usize::try_from(limit).unwrap_or(usize::MAX)
        } else {
            usize::MAX
        };

        Ok(matched.into_iter().skip(skip).take(take).collect())
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        let tables = self.tables.lock();
        let count = tables
            .users
            .values()
            .filter(|u| Self::matching(filter, u))
            .count();
        Ok(count as i64)
    }
}
