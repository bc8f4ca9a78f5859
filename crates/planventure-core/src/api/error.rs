use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unauthorized - token missing, malformed or rejected")]
    Unauthorized,

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Reset token is invalid or expired: {0}")]
    InvalidOrExpiredToken(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Auth Service endpoints, used to pick the right error for a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
    GoogleLogin,
    GoogleCallback,
    Me,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Login => "auth/login",
            Endpoint::Register => "auth/register",
            Endpoint::ForgotPassword => "auth/forgot-password",
            Endpoint::ResetPassword => "auth/reset-password",
            Endpoint::GoogleLogin => "auth/google/login",
            Endpoint::GoogleCallback => "auth/google/login/callback",
            Endpoint::Me => "api/me",
        }
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable reason out of an error body.
    ///
    /// The service answers with `{"message": ...}` or `{"error": ...}`;
    /// anything else is passed through truncated.
    pub fn service_message(body: &str) -> String {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| {
                ["message", "error"]
                    .iter()
                    .find_map(|key| value.get(key).and_then(|v| v.as_str()).map(str::to_string))
            })
            .unwrap_or_else(|| Self::truncate_body(body))
    }

    pub fn from_status(endpoint: Endpoint, status: StatusCode, body: &str) -> Self {
        let message = Self::service_message(body);
        match (endpoint, status.as_u16()) {
            (Endpoint::Login, 401) => AuthError::InvalidCredentials,
            (_, 401) => AuthError::Unauthorized,
            (Endpoint::Register, 409) => AuthError::DuplicateAccount(message),
            (Endpoint::Register, 400) if Self::mentions_existing_account(&message) => {
                AuthError::DuplicateAccount(message)
            }
            (Endpoint::ResetPassword, 400 | 404) => AuthError::InvalidOrExpiredToken(message),
            (_, 400 | 422) => AuthError::Validation(message),
            (_, 500..=599) => AuthError::Server(message),
            _ => AuthError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    fn mentions_existing_account(message: &str) -> bool {
        let lower = message.to_lowercase();
        lower.contains("already") || lower.contains("exists") || lower.contains("registered")
    }

    /// True when the error means the caller has to sign in again
    pub fn requires_login(&self) -> bool {
        matches!(self, AuthError::Unauthorized | AuthError::InvalidCredentials)
    }

    /// Message suitable for showing next to the form that failed
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Validation(reason) => reason.clone(),
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::Unauthorized => "Your session has expired. Please log in again.".to_string(),
            AuthError::DuplicateAccount(_) => {
                "An account with this email already exists".to_string()
            }
            AuthError::InvalidOrExpiredToken(_) => {
                "This password reset link is invalid or has expired.".to_string()
            }
            AuthError::Network(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::Network(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            AuthError::Server(_) | AuthError::InvalidResponse(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            AuthError::Storage(e) => format!("Could not access saved session: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_message_extraction() {
        assert_eq!(AuthError::service_message(r#"{"message": "Bad email"}"#), "Bad email");
        assert_eq!(AuthError::service_message(r#"{"error": "User not found"}"#), "User not found");
        assert_eq!(AuthError::service_message("plain text"), "plain text");

        let long = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let truncated = AuthError::service_message(&long);
        assert!(truncated.contains("truncated"));
        assert!(truncated.len() < long.len() + 40);
    }

    #[test]
    fn test_from_status_per_endpoint() {
        let body = r#"{"message": "nope"}"#;
        assert!(matches!(
            AuthError::from_status(Endpoint::Login, StatusCode::UNAUTHORIZED, body),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_status(Endpoint::Me, StatusCode::UNAUTHORIZED, body),
            AuthError::Unauthorized
        ));
        assert!(matches!(
            AuthError::from_status(Endpoint::Login, StatusCode::BAD_REQUEST, body),
            AuthError::Validation(ref m) if m == "nope"
        ));
        assert!(matches!(
            AuthError::from_status(Endpoint::ResetPassword, StatusCode::NOT_FOUND, body),
            AuthError::InvalidOrExpiredToken(_)
        ));
        assert!(matches!(
            AuthError::from_status(Endpoint::Me, StatusCode::BAD_GATEWAY, body),
            AuthError::Server(_)
        ));
        assert!(matches!(
            AuthError::from_status(Endpoint::Me, StatusCode::IM_A_TEAPOT, body),
            AuthError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_register_duplicate_detection() {
        assert!(matches!(
            AuthError::from_status(
                Endpoint::Register,
                StatusCode::BAD_REQUEST,
                r#"{"message": "Email already registered"}"#
            ),
            AuthError::DuplicateAccount(_)
        ));
        assert!(matches!(
            AuthError::from_status(Endpoint::Register, StatusCode::CONFLICT, "{}"),
            AuthError::DuplicateAccount(_)
        ));
        assert!(matches!(
            AuthError::from_status(
                Endpoint::Register,
                StatusCode::BAD_REQUEST,
                r#"{"message": "Invalid email format"}"#
            ),
            AuthError::Validation(_)
        ));
    }

    #[test]
    fn test_user_message_for_reset_failure() {
        let err = AuthError::InvalidOrExpiredToken("expired".to_string());
        assert!(err.user_message().contains("invalid or has expired"));
        assert!(!err.requires_login());
        assert!(AuthError::Unauthorized.requires_login());
    }
}
