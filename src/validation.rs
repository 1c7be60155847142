//! Client-side form validation.
//!
//! These checks run before any request is built; a failure is shown inline
//! and never reaches the gateway.

use crate::gateway::Credentials;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter your email.")]
    EmptyEmail,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error("Please enter your password.")]
    EmptyPassword,
    #[error("Password must be at least {min} characters.")]
    PasswordTooShort { min: usize },
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Please enter all {expected} digits of the code.")]
    IncompleteCode { expected: usize },
}

/// Trim and lowercase an email, rejecting anything without a single `@`
/// separating two non-empty parts.
///
/// # Errors
///
/// Returns `EmptyEmail` for blank input, `InvalidEmail` otherwise.
pub fn validate_email(email: &str) -> Result<String, ValidationError> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => Ok(normalized),
        _ => Err(ValidationError::InvalidEmail),
    }
}

/// # Errors
///
/// Returns the first email or password problem found.
pub fn validate_credentials(email: &str, password: &str) -> Result<Credentials, ValidationError> {
    let email = validate_email(email)?;
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    Ok(Credentials { email, password: password.to_owned() })
}

/// Check a new password and its confirmation.
///
/// # Errors
///
/// Returns `PasswordTooShort` or `PasswordMismatch`.
pub fn validate_password_setup(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password.is_empty() {
        return Err(ValidationError::EmptyPassword);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
