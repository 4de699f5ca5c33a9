//! Field validation shared by notification payloads and account parsing.
//!
//! Every check returns a [`ValidationError`] naming the offending field, so the HTTP
//! layer can report it back as `INVALID_FIELD` with `details.field`.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Validation error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$")
            .expect("email pattern is valid")
    })
}

/// Validate an email address.
///
/// # Example
/// ```
/// use aurora_mentis::validation::validate_email;
///
/// assert!(validate_email("ana.quispe@example.pe", "student_email").is_ok());
/// assert!(validate_email("not-an-email", "student_email").is_err());
/// ```
pub fn validate_email(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.len() <= 254 && email_regex().is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(field_name, "invalid email address"))
    }
}

/// Validate that a string is not empty or whitespace only.
///
/// # Example
/// ```
/// use aurora_mentis::validation::validate_not_empty;
///
/// assert!(validate_not_empty("Ana", "student_name").is_ok());
/// assert!(validate_not_empty("", "student_name").is_err());
/// assert!(validate_not_empty("   ", "student_name").is_err());
/// ```
pub fn validate_not_empty(value: &str, field_name: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        Err(ValidationError::new(field_name, "cannot be empty"))
    } else {
        Ok(())
    }
}

/// Validate an optional email - if present, it must be a valid address.
pub fn validate_optional_email(value: Option<&str>, field_name: &str) -> ValidationResult<()> {
    match value {
        Some(v) => validate_email(v, field_name),
        None => Ok(()),
    }
}

/// Validate a monetary amount: finite and not negative.
pub fn validate_amount(value: f64, field_name: &str) -> ValidationResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(
            field_name,
            "must be a non-negative amount",
        ))
    }
}

/// Validate a scholarship percentage in `(0, 100]`.
pub fn validate_percentage(value: u8, field_name: &str) -> ValidationResult<()> {
    if (1..=100).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field_name,
            "must be between 1 and 100",
        ))
    }
}

/// Validate an absolute http(s) URL.
pub fn validate_http_url(value: &str, field_name: &str) -> ValidationResult<()> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));

    match rest {
        Some(host) if !host.is_empty() && !host.chars().any(char::is_whitespace) => Ok(()),
        _ => Err(ValidationError::new(
            field_name,
            "must be an absolute http(s) URL",
        )),
    }
}

/// Turn an empty or whitespace-only optional string into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
