use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Account identity returned alongside a token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
}

/// An authenticated token pair plus the profile it belongs to.
///
/// Register and OAuth callback responses may omit the refresh token and the
/// user, so both are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of the "who am I" endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    /// Any other fields the service includes, kept as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Email and password submitted to login/register. Never persisted.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Opaque single-use token from a reset-password link.
#[derive(Clone, PartialEq, Eq)]
pub struct ResetToken(String);

impl ResetToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Extract the `token` query parameter from a reset link such as
    /// `https://app.example.com/reset-password?token=abc`.
    pub fn from_link(link: &str) -> Option<Self> {
        let url = Url::parse(link).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ResetToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResetToken(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("user@example.com", "Secret123");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("user@example.com"));
        assert!(!debug.contains("Secret123"));
    }

    #[test]
    fn test_reset_token_from_link() {
        let token =
            ResetToken::from_link("http://localhost:5173/reset-password?token=abc.def-123")
                .unwrap();
        assert_eq!(token.as_str(), "abc.def-123");

        // Percent-encoded values are decoded
        let token =
            ResetToken::from_link("https://app.example.com/reset-password?x=1&token=a%2Bb")
                .unwrap();
        assert_eq!(token.as_str(), "a+b");

        assert!(ResetToken::from_link("https://app.example.com/reset-password").is_none());
        assert!(ResetToken::from_link("https://app.example.com/reset-password?token=").is_none());
        assert!(ResetToken::from_link("not a link").is_none());
    }

    #[test]
    fn test_session_parses_without_optional_fields() {
        let session: Session = serde_json::from_str(r#"{"access_token": "T1"}"#).unwrap();
        assert_eq!(session.access_token, "T1");
        assert!(session.refresh_token.is_none());
        assert!(session.user.is_none());
    }

    #[test]
    fn test_user_profile_keeps_extra_fields() {
        let profile: UserProfile = serde_json::from_str(
            r#"{"id": 7, "email": "user@example.com", "created_at": "2024-01-01"}"#,
        )
        .unwrap();
        assert_eq!(profile.id, 7);
        assert_eq!(
            profile.extra.get("created_at").and_then(|v| v.as_str()),
            Some("2024-01-01")
        );
    }
}
