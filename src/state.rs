use crate::config::AppConfig;
use crate::store::{self, UserStore};
use crate::users::password::{CredentialHasher, PasswordHashing};
use std::sync::Arc;

/// Process-wide state, built once at startup and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
    pub hasher: Arc<dyn PasswordHashing>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let hasher: Arc<dyn PasswordHashing> = Arc::new(CredentialHasher::new(config.hash)?);
        let store = store::connect(&config).await?;
        Ok(Self {
            config: Arc::new(config),
            store,
            hasher,
        })
    }

    #[cfg(test)]
    pub fn fake(store: Arc<dyn UserStore>) -> Self {
        Self::fake_with_hasher(store, Arc::new(Self::test_hasher()))
    }

    #[cfg(test)]
    pub fn test_hasher() -> CredentialHasher {
        CredentialHasher::new(crate::config::HashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("test hash params are valid")
    }

    #[cfg(test)]
    pub fn fake_with_hasher(store: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHashing>) -> Self {
        use crate::config::{HashConfig, StoreConfig, ValidationConfig};
        use std::time::Duration;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreConfig::Memory,
            store_timeout: Duration::from_secs(5),
            validation: ValidationConfig::default(),
            hash: HashConfig {
                memory_kib: 1024,
                iterations: 1,
                parallelism: 1,
            },
        });

        Self {
            config,
            store,
            hasher,
        }
    }
}
