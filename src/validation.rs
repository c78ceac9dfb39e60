//! Client-side form checks. A failed check means no request is issued.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static SPECIAL_CHARS: &str = r#"!@#$%^&*(),.?":{}|<>"#;

pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 100;
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Password does not meet the requirements: {0}")]
    WeakPassword(PasswordStrength),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Age must be between {MIN_AGE} and {MAX_AGE}, got {0}")]
    AgeOutOfRange(u8),

    #[error("Invalid or missing token")]
    MissingToken,
}

/// Result of checking a password against the reset-password rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PasswordStrength {
    pub min_length: bool,
    pub has_uppercase: bool,
    pub has_lowercase: bool,
    pub has_number: bool,
    pub has_special: bool,
}

impl PasswordStrength {
    pub fn check(password: &str) -> Self {
        Self {
            min_length: password.chars().count() >= MIN_PASSWORD_LENGTH,
            has_uppercase: password.chars().any(|c| c.is_ascii_uppercase()),
            has_lowercase: password.chars().any(|c| c.is_ascii_lowercase()),
            has_number: password.chars().any(|c| c.is_ascii_digit()),
            has_special: password.chars().any(|c| SPECIAL_CHARS.contains(c)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min_length
            && self.has_uppercase
            && self.has_lowercase
            && self.has_number
            && self.has_special
    }
}

impl std::fmt::Display for PasswordStrength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let missing: Vec<&str> = [
            (self.min_length, "at least 8 characters"),
            (self.has_uppercase, "an uppercase letter"),
            (self.has_lowercase, "a lowercase letter"),
            (self.has_number, "a number"),
            (self.has_special, "a special character"),
        ]
        .into_iter()
        .filter_map(|(ok, label)| (!ok).then_some(label))
        .collect();

        write!(f, "missing {}", missing.join(", "))
    }
}

pub fn require<'a>(value: &'a str, field: &'static str) -> Result<&'a str, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

pub fn validate_email(email: &str) -> Result<&str, ValidationError> {
    let email = require(email, "Email")?;
    if EMAIL_REGEX.is_match(email) {
        Ok(email)
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let strength = PasswordStrength::check(password);
    if strength.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::WeakPassword(strength))
    }
}

pub fn validate_confirmation(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    if password == confirmation {
        Ok(())
    } else {
        Err(ValidationError::PasswordMismatch)
    }
}

pub fn validate_age(age: Option<u8>) -> Result<(), ValidationError> {
    match age {
        Some(age) if !(MIN_AGE..=MAX_AGE).contains(&age) => Err(ValidationError::AgeOutOfRange(age)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength_rules() {
        assert!(PasswordStrength::check("Naga@1234$").is_valid());

        let weak = PasswordStrength::check("password");
        assert!(!weak.is_valid());
        assert!(weak.min_length);
        assert!(!weak.has_uppercase);
        assert!(!weak.has_number);
        assert!(!weak.has_special);
        assert_eq!(
            weak.to_string(),
            "missing an uppercase letter, a number, a special character"
        );

        assert!(!PasswordStrength::check("Ab1!").min_length);
        assert!(!PasswordStrength::check("Abcdefg1_").has_special);
    }

    #[test]
    fn test_email_and_required() {
        assert_eq!(validate_email("  ada@example.com "), Ok("ada@example.com"));
        assert_eq!(validate_email("ada@example"), Err(ValidationError::InvalidEmail));
        assert_eq!(
            validate_email("   "),
            Err(ValidationError::MissingField("Email"))
        );
    }

    #[test]
    fn test_confirmation_and_age() {
        assert_eq!(
            validate_confirmation("Secret#123", "Secret#124"),
            Err(ValidationError::PasswordMismatch)
        );
        assert!(validate_confirmation("same", "same").is_ok());

        assert!(validate_age(None).is_ok());
        assert!(validate_age(Some(18)).is_ok());
        assert!(validate_age(Some(100)).is_ok());
        assert_eq!(validate_age(Some(17)), Err(ValidationError::AgeOutOfRange(17)));
        assert_eq!(validate_age(Some(101)), Err(ValidationError::AgeOutOfRange(101)));
    }
}
