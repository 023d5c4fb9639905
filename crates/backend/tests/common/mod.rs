//! Common test utilities and fixtures
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use record_backend::auth::AuthConfig;
use record_backend::cache::UserCache;
use record_backend::models::{NewUser, User};
use record_backend::repository::{
    MemoryUserRepository, RepositoryError, RepositoryResult, UserFilter, UserRepository,
};
use record_backend::routes::build_router;
use record_backend::store::UserStore;
use record_backend::AppState;

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const HASH_SECRET: &str = "integration-hash-secret";

/// Wraps the memory repository; can be told to fail reads or writes and
/// counts reads.
#[derive(Default)]
pub struct FlakyRepository {
    pub inner: MemoryUserRepository,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub reads: AtomicUsize,
}

impl FlakyRepository {
    fn check_read(&self) -> RepositoryResult<()> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend(anyhow::anyhow!("connection reset")));
        }
        Ok(())
    }

    fn check_write(&self) -> RepositoryResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Backend(anyhow::anyhow!("disk full")));
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for FlakyRepository {
    async fn find_by_id(&self, id: i64) -> RepositoryResult<User> {
        self.check_read()?;
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<User> {
        self.check_read()?;
        self.inner.find_by_email(email).await
    }

    async fn insert(&self, user: NewUser) -> RepositoryResult<User> {
        self.check_write()?;
        self.inner.insert(user).await
    }

    async fn save(&self, user: User) -> RepositoryResult<User> {
        self.check_write()?;
        self.inner.save(user).await
    }

    async fn delete_by_id(&self, id: i64) -> RepositoryResult<u64> {
        self.check_write()?;
        self.inner.delete_by_id(id).await
    }

    async fn list(
        &self,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> RepositoryResult<Vec<User>> {
        self.inner.list(filter, limit, offset).await
    }

    async fn count(&self, filter: &UserFilter) -> RepositoryResult<i64> {
        self.inner.count(filter).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: JWT_SECRET.to_string(),
        hash_secret: HASH_SECRET.to_string(),
        token_duration_hours: 24,
        cookie_max_age_secs: 3600,
    }
}

/// Router over the in-memory repository.
pub fn create_test_app() -> TestApp {
    create_test_app_with(Arc::new(MemoryUserRepository::new()))
}

pub fn create_test_app_with(repository: Arc<dyn UserRepository>) -> TestApp {
    let store = UserStore::new(repository, Arc::new(UserCache::default()));
    let state = AppState::new(store, &auth_config()).unwrap();
    TestApp {
        router: build_router(state.clone(), None),
        state,
    }
}

impl TestApp {
    /// Insert a user with the given password, bypassing registration.
    pub async fn seed_user(&self, email: &str, password: &str, active: bool, admin: bool) -> i64 {
        self.state
            .users
            .create(NewUser {
                name: format!("User {}", email),
                email: email.to_string(),
                password_hash: self.state.passwords.hash(password),
                is_active: active,
                is_admin: admin,
            })
            .await
            .unwrap()
            .id
    }

    pub fn bearer_for(&self, id: i64, email: &str) -> String {
        self.state.tokens.sign(id, "Test", email).unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}
