use super::*;

#[test]
fn email_is_trimmed_and_lowercased() {
    assert_eq!(validate_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
}

#[test]
fn email_blank_is_empty_error() {
    assert_eq!(validate_email("   "), Err(ValidationError::EmptyEmail));
}

#[test]
fn email_without_at_is_invalid() {
    assert_eq!(validate_email("ana.example.com"), Err(ValidationError::InvalidEmail));
}

#[test]
fn email_with_empty_parts_is_invalid() {
    assert_eq!(validate_email("@example.com"), Err(ValidationError::InvalidEmail));
    assert_eq!(validate_email("ana@"), Err(ValidationError::InvalidEmail));
    assert_eq!(validate_email("a@b@c"), Err(ValidationError::InvalidEmail));
}

#[test]
fn credentials_require_password() {
    assert_eq!(validate_credentials("ana@example.com", "").unwrap_err(), ValidationError::EmptyPassword);
}

#[test]
fn credentials_normalize_email() {
    let creds = validate_credentials("ANA@example.com", "pw").unwrap();
    assert_eq!(creds.email, "ana@example.com");
    assert_eq!(creds.password, "pw");
}

#[test]
fn password_setup_too_short() {
    assert_eq!(
        validate_password_setup("short", "short"),
        Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN })
    );
}

#[test]
fn password_setup_mismatch() {
    assert_eq!(validate_password_setup("longenough1", "longenough2"), Err(ValidationError::PasswordMismatch));
}

#[test]
fn password_setup_ok() {
    assert!(validate_password_setup("longenough1", "longenough1").is_ok());
}

#[test]
fn messages_are_user_facing() {
    assert_eq!(ValidationError::PasswordTooShort { min: 8 }.to_string(), "Password must be at least 8 characters.");
    assert_eq!(ValidationError::IncompleteCode { expected: 6 }.to_string(), "Please enter all 6 digits of the code.");
}
