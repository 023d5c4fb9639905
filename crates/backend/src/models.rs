// Database models for Diesel
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use record_types::{UserDisplayData, UserResponse};
use std::fmt;

/// A user row. `password_hash` is opaque keyed-hash output and never
/// leaves the backend: it is not serialized and is redacted from `Debug`.
#[derive(Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("is_active", &self.is_active)
            .field("is_admin", &self.is_admin)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl User {
    pub fn display_data(&self) -> UserDisplayData {
        UserDisplayData {
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}

/// Insertable struct for new users; the store assigns `id` and timestamps.
#[derive(Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("is_active", &self.is_active)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}

/// Full-row changeset used by `save`.
#[derive(AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChangeset<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub is_active: bool,
    pub is_admin: bool,
    pub updated_at: DateTime<Utc>,
}

impl<'a> UserChangeset<'a> {
    pub fn from_user(user: &'a User, now: DateTime<Utc>) -> Self {
        UserChangeset {
            name: &user.name,
            email: &user.email,
            password_hash: &user.password_hash,
            is_active: user.is_active,
            is_admin: user.is_admin,
            updated_at: now,
        }
    }
}
