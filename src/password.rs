use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::error::{ApiError, ApiResult};

/// hash_password
///
/// Argon2id with a random salt, returned in PHC string form. Runs on the blocking pool.
pub async fn hash_password(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| ApiError::Internal(format!("password hashing failed: {err}")))
    })
    .await
    .map_err(|err| ApiError::Internal(format!("hashing task failed: {err}")))?
}

/// verify_password
///
/// `Ok(false)` on a wrong password; an unparsable stored hash is an internal error.
pub async fn verify_password(password: String, stored_hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|err| ApiError::Internal(format!("stored hash is invalid: {err}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|err| ApiError::Internal(format!("hashing task failed: {err}")))?
}
