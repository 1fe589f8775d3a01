//! Password hashing and credential verification.
//!
//! Hashes are Argon2id PHC strings with a random per-password salt. Both hashing
//! and verification are CPU-bound, so the async entry points hop onto the
//! blocking thread pool.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::{
    error::{AppError, Result},
    models::{Role, User},
    repository::RepositoryState,
};

/// Hash a plaintext password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Check a plaintext password against a stored hash.
///
/// A mismatch is `Ok(false)`; only an unparseable hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| AppError::PasswordHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::PasswordHash(e.to_string())),
    }
}

async fn hash_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

/// verify
///
/// Resolves `login` and checks `password` against its stored hash. Returns the
/// account on success and `None` for an unknown login or a wrong password, so the
/// caller cannot tell the two apart.
pub async fn verify(repo: &RepositoryState, login: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = repo.find_user_by_login(login).await? else {
        return Ok(None);
    };

    if verify_blocking(password.to_string(), user.password_hash.clone()).await? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

/// register
///
/// Validates and hashes a new account's credentials, then persists it.
/// Fails with `DuplicateLogin` when the login is taken.
pub async fn register(
    repo: &RepositoryState,
    login: &str,
    password: &str,
    role: Role,
) -> Result<User> {
    // Stored verbatim; login lookups are exact.
    if login.trim().is_empty() {
        return Err(AppError::Validation("login must not be empty".to_string()));
    }
    if password.is_empty() {
        return Err(AppError::Validation("password must not be empty".to_string()));
    }

    let password_hash = hash_blocking(password.to_string()).await?;
    repo.create_user(login, &password_hash, role).await
}
