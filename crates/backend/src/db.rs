use anyhow::{anyhow, Context};
use diesel::prelude::*;
use diesel_async::{
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::{
        deadpool::{Object, Pool, PoolError},
        AsyncDieselConnectionManager, ManagerConfig,
    },
    AsyncConnection, AsyncPgConnection, RunQueryDsl,
};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::config::DatabaseConfig;
use crate::models::{NewUser, User, UserChangeset};

pub type DbPool = Pool<AsyncPgConnection>;
pub type DbConnection = Object<AsyncPgConnection>;

/// Schema migrations compiled into the binary from `migrations/`.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

async fn establish_tls_connection(config: String) -> diesel::ConnectionResult<AsyncPgConnection> {
    // Set up rustls TLS configuration
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);

    // Parse the connection string and connect with TLS
    let (client, connection) = tokio_postgres::connect(&config, tls)
        .await
        .map_err(|e| diesel::ConnectionError::BadConnection(e.to_string()))?;

    // Spawn the connection task
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Connection error: {}", e);
        }
    });

    // Build the async connection from the tokio-postgres client
    AsyncPgConnection::try_from(client).await
}

fn database_url(config: &DatabaseConfig) -> anyhow::Result<String> {
    config
        .url
        .clone()
        .ok_or_else(|| anyhow!("DATABASE_URL must be set for the postgres backend"))
}

/// Apply pending migrations over a dedicated connection, returning how many
/// ran. Must be called from within the tokio runtime.
pub async fn run_migrations(config: &DatabaseConfig) -> anyhow::Result<usize> {
    let database_url = database_url(config)?;
    let conn = if config.tls {
        establish_tls_connection(database_url).await
    } else {
        AsyncPgConnection::establish(&database_url).await
    }
    .context("failed to connect for migrations")?;

    // The migration harness blocks
    let mut harness: AsyncConnectionWrapper<AsyncPgConnection> = AsyncConnectionWrapper::from(conn);
    let applied = tokio::task::spawn_blocking(move || {
        harness
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| {
                for version in &versions {
                    tracing::info!("Applied migration {}", version);
                }
                versions.len()
            })
            .map_err(|e| anyhow!("failed to apply migrations: {}", e))
    })
    .await
    .context("migration task panicked")??;

    tracing::info!(applied, "Database schema up to date");
    Ok(applied)
}

pub fn establish_connection_pool(config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    let database_url = database_url(config)?;

    let mut manager_config = ManagerConfig::default();
    if config.tls {
        manager_config.custom_setup =
            Box::new(|url| Box::pin(establish_tls_connection(url.to_string())));
    }

    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new_with_config(
        database_url,
        manager_config,
    );
    let pool = Pool::builder(manager).max_size(config.pool_size).build()?;

    tracing::info!(
        tls = config.tls,
        pool_size = config.pool_size,
        "Database connection pool initialized"
    );

    Ok(pool)
}

pub async fn get_conn(pool: &DbPool) -> Result<DbConnection, PoolError> {
    pool.get().await
}

// User database operations
pub mod users {
    use super::*;
    use chrono::Utc;

    pub async fn get_by_id(
        conn: &mut AsyncPgConnection,
        user_id: i64,
    ) -> QueryResult<Option<User>> {
        use crate::schema::users::dsl::*;

        users
            .filter(id.eq(user_id))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn get_by_email(
        conn: &mut AsyncPgConnection,
        email_val: &str,
    ) -> QueryResult<Option<User>> {
        use crate::schema::users::dsl::*;

        users
            .filter(email.eq(email_val))
            .select(User::as_select())
            .first(conn)
            .await
            .optional()
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_user: &NewUser) -> QueryResult<User> {
        use crate::schema::users::dsl::*;

        diesel::insert_into(users)
            .values(new_user)
            .returning(User::as_returning())
            .get_result(conn)
            .await
    }

    /// Overwrite every mutable column. Returns `None` when the row is gone.
    pub async fn save(conn: &mut AsyncPgConnection, user: &User) -> QueryResult<Option<User>> {
        use crate::schema::users::dsl::*;

        diesel::update(users.filter(id.eq(user.id)))
            .set(UserChangeset::from_user(user, Utc::now()))
            .returning(User::as_returning())
            .get_result(conn)
            .await
            .optional()
    }

    pub async fn delete(conn: &mut AsyncPgConnection, user_id: i64) -> QueryResult<usize> {
        use crate::schema::users::dsl::*;

        diesel::delete(users.filter(id.eq(user_id)))
            .execute(conn)
            .await
    }

    pub async fn list(
        conn: &mut AsyncPgConnection,
        name_filter: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> QueryResult<Vec<User>> {
        use crate::schema::users::dsl::*;

        let mut query = users.select(User::as_select()).into_boxed();

        if let Some(needle) = name_filter {
            query = query.filter(name.like(format!("%{}%", needle)));
        }
        if limit > 0 {
            query = query.limit(limit);
        }
        if offset > 0 {
            query = query.offset(offset);
        }

        query.order_by((name.asc(), id.asc())).load(conn).await
    }

    pub async fn count(conn: &mut AsyncPgConnection, name_filter: Option<&str>) -> QueryResult<i64> {
        use crate::schema::users::dsl::*;

        let mut query = users.count().into_boxed();

        if let Some(needle) = name_filter {
            query = query.filter(name.like(format!("%{}%", needle)));
        }

        query.get_result(conn).await
    }
}
