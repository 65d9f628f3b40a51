// Input sanitation and validation for credentials and account data

use crate::errors::{AppError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static JAVASCRIPT_PROTOCOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript:").unwrap());
static EVENT_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on\w+\s*=").unwrap());
static DATA_PROTOCOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)data:").unwrap());
static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@<>]+@[^\s@<>]+\.[^\s@<>]+$").unwrap());

pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MIN_PASSWORD_LENGTH: usize = 12;
pub const MAX_PASSWORD_LENGTH: usize = 128;
pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 100;

/// Strip markup and script vectors from free-form input
pub fn sanitize_string(input: &str) -> String {
    let without_brackets: String = input.chars().filter(|c| *c != '<' && *c != '>').collect();
    let stripped = JAVASCRIPT_PROTOCOL.replace_all(&without_brackets, "");
    let stripped = EVENT_HANDLER.replace_all(&stripped, "");
    let stripped = DATA_PROTOCOL.replace_all(&stripped, "");
    stripped.trim().to_string()
}

/// Canonical form of a login identifier (email or IP)
///
/// Case and surrounding whitespace never distinguish two identifiers.
pub fn normalize_identifier(identifier: &str) -> String {
    sanitize_string(&identifier.trim().to_lowercase())
}

/// Check email shape and length
pub fn validate_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() || email.len() > MAX_EMAIL_LENGTH || !EMAIL.is_match(email) {
        return Err(AppError::ValidationError("Invalid email format".to_string()));
    }
    Ok(())
}

/// Enforce the password policy for new accounts
pub fn validate_password_policy(password: &str) -> Result<()> {
    let mut problems = Vec::new();

    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if length > MAX_PASSWORD_LENGTH {
        problems.push("Password too long".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        problems.push("Password must contain uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        problems.push("Password must contain lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain number".to_string());
    }
    if !password.chars().any(|c| !c.is_ascii_alphanumeric()) {
        problems.push("Password must contain special character".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!(
            "Validation failed: {}",
            problems.join(", ")
        )))
    }
}

/// Sanitize and length-check a display name
pub fn validate_display_name(name: &str) -> Result<String> {
    let name = sanitize_string(name);
    let length = name.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(AppError::ValidationError(format!(
            "Validation failed: Name must be at least {} characters",
            MIN_NAME_LENGTH
        )));
    }
    if length > MAX_NAME_LENGTH {
        return Err(AppError::ValidationError(
            "Validation failed: Name too long".to_string(),
        ));
    }
    Ok(name)
}

/// Mask an email for logs: keeps the first two characters and the domain
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if local.chars().count() > 2 => {
            let visible: String = local.chars().take(2).collect();
            format!("{}***@{}", visible, domain)
        }
        Some((local, domain)) => format!("{}***@{}", local, domain),
        None => "***".to_string(),
    }
}
