use std::time::Duration;

use secrecy::Secret;
use thiserror::Error;

/// Errors raised while reading configuration at startup. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}

/// Which table store backs the `users` table.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// Hosted REST table API (`SUPABASE_URL` + `SUPABASE_KEY`).
    Rest { url: String, key: Secret<String> },
    /// Direct Postgres connection to the same table.
    Postgres { database_url: Secret<String> },
    /// Process-local table, for development.
    Memory,
}

#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub min_username_len: usize,
    pub min_password_len: usize,
    pub require_email_shape: bool,
    pub require_password_complexity: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_username_len: 3,
            min_password_len: 8,
            require_email_shape: true,
            require_password_complexity: true,
        }
    }
}

/// Argon2id cost parameters.
///
/// Defaults follow the OWASP minimum for Argon2id: 19 MiB of memory,
/// two passes, one lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19_456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    pub store_timeout: Duration,
    pub validation: ValidationConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let backend = get("STORE_BACKEND").unwrap_or_else(|| "rest".into());
        let store = match backend.to_lowercase().as_str() {
            "rest" | "supabase" => StoreConfig::Rest {
                url: required("SUPABASE_URL")?.trim_end_matches('/').to_string(),
                key: Secret::new(required("SUPABASE_KEY")?),
            },
            "postgres" => StoreConfig::Postgres {
                database_url: Secret::new(required("DATABASE_URL")?),
            },
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::Invalid(
                    "STORE_BACKEND",
                    format!("unknown backend `{other}`"),
                ))
            }
        };

        let defaults = ValidationConfig::default();
        let validation = ValidationConfig {
            min_username_len: parse_or(&get, "MIN_USERNAME_LEN", defaults.min_username_len)?,
            min_password_len: parse_or(&get, "MIN_PASSWORD_LEN", defaults.min_password_len)?,
            require_email_shape: parse_bool_or(
                &get,
                "REQUIRE_EMAIL_SHAPE",
                defaults.require_email_shape,
            )?,
            require_password_complexity: parse_bool_or(
                &get,
                "REQUIRE_PASSWORD_COMPLEXITY",
                defaults.require_password_complexity,
            )?,
        };

        let hash_defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_or(&get, "ARGON2_MEMORY_KIB", hash_defaults.memory_kib)?,
            iterations: parse_or(&get, "ARGON2_ITERATIONS", hash_defaults.iterations)?,
            parallelism: parse_or(&get, "ARGON2_PARALLELISM", hash_defaults.parallelism)?,
        };

        let timeout_secs: u64 = parse_or(&get, "STORE_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "STORE_TIMEOUT_SECS",
                "must be greater than zero".into(),
            ));
        }

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8000)?,
            store,
            store_timeout: Duration::from_secs(timeout_secs),
            validation,
            hash,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::Invalid(key, e.to_string())),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::Invalid(key, format!("`{v}` is not a boolean"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn rest_backend_reads_both_secrets() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://project.supabase.co/"),
            ("SUPABASE_KEY", "service-key"),
        ]))
        .expect("config should load");

        match cfg.store {
            StoreConfig::Rest { url, key } => {
                assert_eq!(url, "https://project.supabase.co");
                assert_eq!(key.expose_secret(), "service-key");
            }
            other => panic!("unexpected store config: {other:?}"),
        }
        assert_eq!(cfg.store_timeout, Duration::from_secs(10));
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.hash, HashConfig::default());
    }

    #[test]
    fn missing_url_is_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("SUPABASE_KEY", "k")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPABASE_URL")));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err = AppConfig::from_lookup(lookup(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("SUPABASE_KEY")));
    }

    #[test]
    fn postgres_backend_requires_database_url() {
        let err = AppConfig::from_lookup(lookup(&[("STORE_BACKEND", "postgres")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("STORE_BACKEND", "sqlite")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("STORE_BACKEND", _)));
    }

    #[test]
    fn rule_overrides_are_parsed() {
        let cfg = AppConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("MIN_USERNAME_LEN", "5"),
            ("REQUIRE_PASSWORD_COMPLEXITY", "false"),
            ("STORE_TIMEOUT_SECS", "3"),
        ]))
        .expect("config should load");
        assert_eq!(cfg.validation.min_username_len, 5);
        assert!(!cfg.validation.require_password_complexity);
        assert!(cfg.validation.require_email_shape);
        assert_eq!(cfg.store_timeout, Duration::from_secs(3));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("APP_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("APP_PORT", _)));

        let err = AppConfig::from_lookup(lookup(&[
            ("STORE_BACKEND", "memory"),
            ("STORE_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("STORE_TIMEOUT_SECS", _)));
    }
}
