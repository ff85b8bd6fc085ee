/// Password hashing using Argon2id
///
/// Hashes are stored in PHC string format, so the parameters travel with
/// the hash and verification needs no configuration.
///
/// - **Memory**: 64 MB (65536 KB)
/// - **Iterations**: 3 passes
/// - **Parallelism**: 4 lanes
///
/// # Example
///
/// ```
/// use planboard_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sup3r$ecret")?;
/// assert!(verify_password("Sup3r$ecret", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length, in characters
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Password rejected by [`validate_password_strength`]
    #[error("{0}")]
    Weak(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(65536)
        .t_cost(3)
        .p_cost(4)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// Returns `Ok(false)` on mismatch; errors are reserved for unreadable hashes.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    // A PHC string may parse without salt or digest; nothing can match it
    if parsed_hash.salt.is_none() || parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash(
            "Hash is missing its salt or digest".to_string(),
        ));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Checks that a password meets the minimum requirements
///
/// - Between 8 and 128 characters
/// - At least one uppercase letter, one lowercase letter, one digit, and one
///   symbol
///
/// ```
/// use planboard_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("Planb0ard!").is_ok());
/// assert!(validate_password_strength("sh0rt!A").is_err());
/// assert!(validate_password_strength("alllowercase1!").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::Weak(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(PasswordError::Weak(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        )));
    }

    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordError::Weak(
            "Password must contain at least one uppercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordError::Weak(
            "Password must contain at least one lowercase letter".to_string(),
        ));
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordError::Weak(
            "Password must contain at least one digit".to_string(),
        ));
    }

    if password.chars().all(|c| c.is_alphanumeric()) {
        return Err(PasswordError::Weak(
            "Password must contain at least one special character".to_string(),
        ));
    }

    Ok(())
}
