//! Input rules shared by the services.

use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{Result, ServiceError};

pub const MIN_PASSWORD_LEN: usize = 6;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s]+$").expect("valid name regex"));
static TASK_TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\s\-_]+$").expect("valid title regex"));
static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Trims and checks a person's name: letters and spaces only.
pub fn person_name(raw: &str) -> Result<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("Name cannot be blank"));
    }
    if !NAME_RE.is_match(name) {
        return Err(ServiceError::validation(
            "Name may only contain letters and spaces",
        ));
    }
    Ok(name.to_string())
}

/// Lower-cases and checks an email address.
pub fn email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(ServiceError::validation("Invalid email address"));
    }
    Ok(email)
}

pub fn password(raw: &str) -> Result<()> {
    if raw.chars().count() < MIN_PASSWORD_LEN {
        return Err(ServiceError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn task_title(raw: &str) -> Result<String> {
    if raw.trim().is_empty() {
        return Err(ServiceError::validation("Missing title"));
    }
    if !TASK_TITLE_RE.is_match(raw) {
        return Err(ServiceError::validation(
            "Task title contains invalid characters",
        ));
    }
    Ok(raw.trim().to_string())
}
