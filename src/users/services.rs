use std::sync::Arc;

use secrecy::{ExposeSecret, Secret};
use tracing::{info, warn};

use crate::{
    error::AppError,
    state::AppState,
    store::{NewUser, StoredUser},
};

use super::{
    password::{PasswordError, PasswordHashing},
    schema::{LoginRequest, RegisterRequest},
};

/// Runs Argon2 on the blocking pool so request workers stay responsive.
pub async fn hash_password(
    hasher: &Arc<dyn PasswordHashing>,
    password: Secret<String>,
) -> Result<String, PasswordError> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret()))
        .await
        .map_err(|e| PasswordError::Hash(format!("hashing task failed: {e}")))?
}

pub async fn verify_password(
    hasher: &Arc<dyn PasswordHashing>,
    password: Secret<String>,
    hash: String,
) -> Result<bool, PasswordError> {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || hasher.verify(password.expose_secret(), &hash))
        .await
        .map_err(|e| PasswordError::Hash(format!("verify task failed: {e}")))?
}

/// Hashes the password and inserts one row. Success is decided solely by the
/// store's own result.
pub async fn register_user(state: &AppState, req: RegisterRequest) -> Result<(), AppError> {
    const ACTION: &str = "user not created";

    let RegisterRequest {
        username,
        email,
        password,
    } = req;

    let password_hash = hash_password(&state.hasher, password).await.map_err(|e| {
        warn!(%username, %email, outcome = "hash_failed", error = %e, "registration failed");
        AppError::hashing(ACTION, e)
    })?;

    let row = NewUser {
        username,
        email,
        password_hash,
    };

    if let Err(e) = state.store.insert_user(&row).await {
        warn!(
            username = %row.username,
            email = %row.email,
            outcome = "insert_failed",
            error = %e,
            "registration failed"
        );
        return Err(AppError::persistence(ACTION, e));
    }

    info!(username = %row.username, email = %row.email, outcome = "created", "user registered");
    Ok(())
}

/// Looks the user up by email and checks the password. Unknown email and wrong
/// password produce the same error.
pub async fn authenticate(state: &AppState, req: LoginRequest) -> Result<StoredUser, AppError> {
    const ACTION: &str = "login failed";

    let user = match state.store.find_by_email(&req.email).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            // Same Argon2 cost as a wrong password.
            let decoy = state.hasher.decoy_hash().to_string();
            let _ = verify_password(&state.hasher, req.password, decoy).await;
            warn!(email = %req.email, outcome = "unknown_email", "login rejected");
            return Err(AppError::Unauthorized);
        }
        Err(e) => {
            warn!(email = %req.email, outcome = "lookup_failed", error = %e, "login failed");
            return Err(AppError::persistence(ACTION, e));
        }
    };

    let ok = verify_password(&state.hasher, req.password, user.password_hash.clone())
        .await
        .map_err(|e| {
            warn!(email = %req.email, outcome = "verify_failed", error = %e, "login failed");
            AppError::hashing(ACTION, e)
        })?;

    if !ok {
        warn!(email = %req.email, outcome = "wrong_password", "login rejected");
        return Err(AppError::Unauthorized);
    }

    info!(username = %user.username, email = %user.email, outcome = "ok", "user logged in");
    Ok(user)
}
