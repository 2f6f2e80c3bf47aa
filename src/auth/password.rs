//! Password hashing and credential rules

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_USERNAME_LENGTH: usize = 150;

const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "letmein1", "admin123", "welcome1",
    "11111111", "abc12345", "football", "baseball", "sunshine", "princess",
    "passw0rd", "senha123",
];

/// Hash a password into an argon2 PHC string
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

/// Check a password against a stored PHC string.
///
/// Unparsable hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// 1..=150 characters of letters, digits and `@.+-_`
pub fn validate_username(username: &str) -> Result<(), AppError> {
    let length = username.chars().count();
    if length == 0 || length > MAX_USERNAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Username must be between 1 and {} characters.",
            MAX_USERNAME_LENGTH
        )));
    }
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !valid {
        return Err(AppError::Validation(
            "Username may contain only letters, numbers, and @/./+/-/_ characters.".to_string(),
        ));
    }
    // Usernames name media directories
    if username.chars().all(|c| c == '.') {
        return Err(AppError::Validation(
            "Username must contain at least one character other than a dot.".to_string(),
        ));
    }
    Ok(())
}

/// Password strength rules shared by registration and password change
pub fn validate_password(password: &str, username: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::Validation(
            "This password is entirely numeric.".to_string(),
        ));
    }
    let lowered = password.to_lowercase();
    if !username.is_empty() && lowered.contains(&username.to_lowercase()) {
        return Err(AppError::Validation(
            "The password is too similar to the username.".to_string(),
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        return Err(AppError::Validation(
            "This password is too common.".to_string(),
        ));
    }
    Ok(())
}

/// Validate a new password and its confirmation
pub fn validate_new_password(
    password: &str,
    confirm: &str,
    username: &str,
) -> Result<(), AppError> {
    if password != confirm {
        return Err(AppError::Validation(
            "The two password fields didn't match.".to_string(),
        ));
    }
    validate_password(password, username)
}
