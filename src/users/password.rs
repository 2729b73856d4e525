use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

use crate::config::HashConfig;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password must not be empty")]
    InvalidInput,
    #[error("invalid hash parameters: {0}")]
    InvalidParams(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Hashing seam used by the user services.
pub trait PasswordHashing: Send + Sync {
    fn hash(&self, plain: &str) -> Result<String, PasswordError>;
    fn verify(&self, plain: &str, hash: &str) -> Result<bool, PasswordError>;
    /// A valid hash under the current parameters that no user password matches.
    /// Logins for unknown accounts verify against it so they cost the same as
    /// a wrong password.
    fn decoy_hash(&self) -> &str;
}

/// Argon2id hasher with fixed cost parameters.
///
/// Every call to [`CredentialHasher::hash`] draws a fresh 16-byte salt from the
/// OS RNG, so hashing the same password twice yields two different PHC strings
/// that both verify.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    decoy: Arc<str>,
}

impl CredentialHasher {
    pub fn new(cfg: HashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let decoy = hash_with(&argon2, "decoy account password")?;
        Ok(Self {
            argon2,
            decoy: decoy.into(),
        })
    }
}

fn hash_with(argon2: &Argon2<'static>, plain: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            PasswordError::Hash(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

impl PasswordHashing for CredentialHasher {
    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        if plain.is_empty() {
            return Err(PasswordError::InvalidInput);
        }
        hash_with(&self.argon2, plain)
    }

    /// Checks `plain` against a stored PHC string. The parameters embedded in
    /// the hash are used, so hashes made under older cost settings still verify.
    fn verify(&self, plain: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            PasswordError::MalformedHash(e.to_string())
        })?;
        Ok(self
            .argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    fn decoy_hash(&self) -> &str {
        &self.decoy
    }
}
