//! Field validation shared by the account, patient and visit services.
//!
//! Text is trimmed before checking; lengths count characters, not bytes.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Required text of `min..=max` characters, trimmed.
pub fn required(field: &'static str, value: &str, min: usize, max: usize) -> Result<String, FieldError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FieldError::new(field, "This field is required"));
    }
    check_length(field, value, min, max)?;
    Ok(value.to_string())
}

/// Optional text of at most `max` characters; blank becomes `None`.
pub fn optional(field: &'static str, value: Option<&str>, max: usize) -> Result<Option<String>, FieldError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => {
            check_length(field, value, 0, max)?;
            Ok(Some(value.to_string()))
        }
        None => Ok(None),
    }
}

/// Optional email address of at most `max` characters.
pub fn optional_email(field: &'static str, value: Option<&str>, max: usize) -> Result<Option<String>, FieldError> {
    let value = optional(field, value, max)?;
    if let Some(email) = &value {
        if !email_pattern().is_match(email) {
            return Err(FieldError::new(field, "Invalid email address"));
        }
    }
    Ok(value)
}

/// New password: minimum length, and the confirmation must match.
pub fn new_password(password: &str, confirm: &str) -> Result<(), FieldError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(FieldError::new(
            "password",
            format!("Field must be at least {MIN_PASSWORD_LENGTH} characters long"),
        ));
    }
    if password != confirm {
        return Err(FieldError::new("confirm_password", "Passwords must match"));
    }
    Ok(())
}

fn check_length(field: &'static str, value: &str, min: usize, max: usize) -> Result<(), FieldError> {
    let len = value.chars().count();
    if len < min {
        return Err(FieldError::new(field, format!("Field must be at least {min} characters long")));
    }
    if len > max {
        return Err(FieldError::new(field, format!("Field cannot be longer than {max} characters")));
    }
    Ok(())
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("static regex"))
}
