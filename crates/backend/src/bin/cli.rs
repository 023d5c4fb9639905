use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use record_types::RegisterRequest;
use validator::Validate;

use record_backend::auth::PasswordHasher;
use record_backend::config::{DatabaseConfig, StorageBackend};
use record_backend::db;
use record_backend::models::{NewUser, User};
use record_backend::repository::{
    PgUserRepository, RepositoryError, UserFilter, UserRepository,
};

#[derive(Parser)]
#[command(name = "record-admin")]
#[command(about = "Administer record service accounts directly in the database")]
#[command(
    long_about = "Account administration for the record services backend.\n\n\
    Registration creates inactive accounts; this tool is how they get activated.\n\
    It talks to Postgres directly, so a running server may keep serving a cached\n\
    copy of a changed account until its cache entry expires."
)]
struct Cli {
    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Connect to Postgres over TLS.
    #[arg(long, env = "DATABASE_TLS", default_value_t = false)]
    database_tls: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending schema migrations
    Migrate,

    /// List accounts, ordered by name
    List {
        /// Only show accounts whose name contains this text.
        #[arg(short, long, value_name = "TEXT")]
        name: Option<String>,

        /// Maximum number of accounts to show.
        #[arg(short, long, default_value_t = 100)]
        limit: i64,
    },

    /// Allow an account to log in
    Activate { email: String },

    /// Block an account from logging in; existing tokens stay valid until expiry
    Deactivate { email: String },

    /// Grant admin rights to an account
    Promote { email: String },

    /// Create an active admin account
    CreateAdmin {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Password for the new account (6-15 characters).
        #[arg(long, env = "RECORD_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Key for the password hash; must match the server's.
        #[arg(long, env = "HASH_SECRET", hide_env_values = true)]
        hash_secret: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let database = DatabaseConfig {
        url: Some(cli.database_url.clone()),
        tls: cli.database_tls,
        pool_size: 1,
        backend: StorageBackend::Postgres,
    };

    if let Commands::Migrate = cli.command {
        let applied = db::run_migrations(&database).await?;
        println!("Applied {} migration(s)", applied);
        return Ok(());
    }

    let pool = db::establish_connection_pool(&database)?;
    let repo = PgUserRepository::new(pool);

    match cli.command {
        Commands::Migrate => {}
        Commands::List { name, limit } => {
            let filter = UserFilter { name };
            let users = repo.list(&filter, limit, 0).await?;
            let total = repo.count(&filter).await?;
            if users.is_empty() {
                println!("No accounts found.");
            }
            for user in &users {
                print_user(user);
            }
            if total > users.len() as i64 {
                println!("... {} more", total - users.len() as i64);
            }
        }
        Commands::Activate { email } => {
            let user = set_flags(&repo, &email, |u| u.is_active = true).await?;
            println!("Activated {}", user.email);
        }
        Commands::Deactivate { email } => {
            let user = set_flags(&repo, &email, |u| u.is_active = false).await?;
            println!("Deactivated {}", user.email);
        }
        Commands::Promote { email } => {
            let user = set_flags(&repo, &email, |u| u.is_admin = true).await?;
            println!("Promoted {} to admin", user.email);
        }
        Commands::CreateAdmin {
            name,
            email,
            password,
            hash_secret,
        } => {
            let request = RegisterRequest {
                name,
                email,
                password_repeat: password.clone(),
                password,
            };
            request.validate().context("invalid account details")?;

            let hasher = PasswordHasher::new(&hash_secret)
                .map_err(|e| anyhow::anyhow!("invalid HASH_SECRET: {}", e))?;
            let created = repo
                .insert(NewUser {
                    name: request.name,
                    password_hash: hasher.hash(&request.password),
                    email: request.email,
                    is_active: true,
                    is_admin: true,
                })
                .await;

            match created {
                Ok(user) => println!("Created admin [{}] {}", user.id, user.email),
                Err(RepositoryError::DuplicateKey) => bail!("an account with that email exists"),
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}

async fn set_flags(
    repo: &PgUserRepository,
    email: &str,
    apply: impl FnOnce(&mut User),
) -> anyhow::Result<User> {
    let mut user = match repo.find_by_email(email).await {
        Ok(user) => user,
        Err(RepositoryError::NotFound) => bail!("no account with email {}", email),
        Err(e) => return Err(e.into()),
    };
    apply(&mut user);
    Ok(repo.save(user).await?)
}

fn print_user(user: &User) {
    let status = if user.is_active { "✓" } else { "○" };
    let role = if user.is_admin { " (admin)" } else { "" };
    println!(
        "{} [{}] {} <{}>{}",
        status, user.id, user.name, user.email, role
    );
}
