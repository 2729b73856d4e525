use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

use super::{NewUser, PersistenceError, StoredUser, UserStore};

const UNIQUE_VIOLATION: &str = "23505";

/// `users` table reached over a direct Postgres connection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(
        database_url: &Secret<String>,
        acquire_timeout: Duration,
    ) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(database_url.expose_secret())
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &NewUser) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        debug!(username = %user.username, "row inserted");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, PersistenceError> {
        sqlx::query_as::<_, StoredUser>(
            r#"
            SELECT username, email, password_hash
            FROM users
            WHERE email = $1
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}

fn map_sqlx_error(err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Database(db) => {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let what = db
                    .constraint()
                    .map(|c| format!("violates {c}"))
                    .unwrap_or_else(|| "duplicate username or email".into());
                PersistenceError::Conflict(what)
            } else {
                PersistenceError::Rejected(db.message().to_string())
            }
        }
        sqlx::Error::PoolTimedOut => {
            PersistenceError::Unavailable("timed out acquiring a connection".into())
        }
        sqlx::Error::Io(e) => PersistenceError::Unavailable(e.to_string()),
        other => PersistenceError::Rejected(other.to_string()),
    }
}
