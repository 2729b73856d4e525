//! Access to the hosted `users` table.
//!
//! The table lives outside this service; uniqueness of `username` and `email`
//! is enforced there and surfaces here as [`PersistenceError::Conflict`].

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use tracing::info;

use crate::config::{AppConfig, StoreConfig};

mod memory;
mod postgres;
mod rest;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use rest::RestStore;

pub const USERS_TABLE: &str = "users";

/// Row written on registration. Never carries the plaintext password.
#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Row read back for credential checks.
#[derive(Debug, Clone, Deserialize, FromRow)]
pub struct StoredUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A unique constraint on the table rejected the row.
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    /// The store answered but refused the request.
    #[error("store rejected the request: {0}")]
    Rejected(String),
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &NewUser) -> Result<(), PersistenceError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, PersistenceError>;
}

/// Bounds every call on the wrapped store with the same deadline.
pub struct TimeoutStore {
    inner: Arc<dyn UserStore>,
    limit: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn UserStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl UserStore for TimeoutStore {
    async fn insert_user(&self, user: &NewUser) -> Result<(), PersistenceError> {
        tokio::time::timeout(self.limit, self.inner.insert_user(user))
            .await
            .map_err(|_| PersistenceError::Timeout(self.limit))?
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<StoredUser>, PersistenceError> {
        tokio::time::timeout(self.limit, self.inner.find_by_email(email))
            .await
            .map_err(|_| PersistenceError::Timeout(self.limit))?
    }
}

/// Builds the process-wide store handle from validated configuration.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn UserStore>> {
    let inner: Arc<dyn UserStore> = match &config.store {
        StoreConfig::Rest { url, key } => {
            info!(%url, "using REST table store");
            Arc::new(
                RestStore::new(url, key.clone(), config.store_timeout)
                    .context("build REST client")?,
            )
        }
        StoreConfig::Postgres { database_url } => {
            info!("using Postgres table store");
            Arc::new(
                PgStore::connect(database_url, config.store_timeout)
                    .await
                    .context("connect to database")?,
            )
        }
        StoreConfig::Memory => {
            info!("using in-memory table store");
            Arc::new(MemoryStore::default())
        }
    };
    Ok(Arc::new(TimeoutStore::new(inner, config.store_timeout)))
}
