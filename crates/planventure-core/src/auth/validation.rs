//! Input checks run before anything is sent to the Auth Service.

use regex::Regex;

/// Minimum password length for new passwords
const MIN_PASSWORD_LENGTH: usize = 8;

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").is_ok_and(|re| re.is_match(email))
}

/// Check a password chosen at registration, returning the reason it is
/// rejected.
pub fn check_new_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number".to_string());
    }
    Ok(())
}
