//! HTTP client for the Planventure Auth Service.
//!
//! Every operation is a single request/response exchange; nothing is
//! retried. Successful sign-ins write their tokens to the injected
//! `TokenStore`, which is the only side effect.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::validation::{check_new_password, is_valid_email};
use crate::auth::{Credentials, ResetToken, Session, TokenStore, User, UserProfile};

use super::error::Endpoint;
use super::AuthError;

/// HTTP request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Returned by `forgot_password` whether or not the account exists
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists for that email, a password reset link has been sent.";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    remember_me: bool,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct ForgotPasswordRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    token: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleLoginResponse {
    auth_url: String,
}

/// Outcome of a password reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordReset {
    /// The service issued a fresh token pair, now stored
    SignedIn(Session),
    /// The password changed; the user still has to log in
    Confirmed { message: String },
}

/// Client for the Auth Service.
/// Clone is cheap - reqwest::Client and the store are both shared.
#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: Url,
    store: Arc<dyn TokenStore>,
}

impl AuthClient {
    /// Create a client for the service at `base_url`, persisting tokens in `store`
    pub fn new(mut base_url: Url, store: Arc<dyn TokenStore>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        // Endpoint paths are joined relative to the base
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> Result<Url, AuthError> {
        self.base_url
            .join(endpoint.path())
            .map_err(|e| AuthError::Validation(format!("Invalid endpoint URL: {}", e)))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(endpoint: Endpoint, response: Response) -> Result<Response, AuthError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(endpoint = endpoint.path(), %status, "Auth Service rejected request");
            Err(AuthError::from_status(endpoint, status, &body))
        }
    }

    async fn read_json<T: DeserializeOwned>(
        endpoint: Endpoint,
        response: Response,
    ) -> Result<T, AuthError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            AuthError::InvalidResponse(format!("Failed to parse {} response: {}", endpoint.path(), e))
        })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        body: &B,
    ) -> Result<T, AuthError> {
        let url = self.endpoint_url(endpoint)?;
        let response = self.client.post(url).json(body).send().await?;
        let response = Self::check_response(endpoint, response).await?;
        Self::read_json(endpoint, response).await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: Endpoint, url: Url) -> Result<T, AuthError> {
        let response = self.client.get(url).send().await?;
        let response = Self::check_response(endpoint, response).await?;
        Self::read_json(endpoint, response).await
    }

    /// Store the token pair from a sign-in response and build the session
    fn persist(&self, endpoint: Endpoint, response: TokenResponse) -> Result<Session, AuthError> {
        let access_token = response.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            AuthError::InvalidResponse(format!("No access token received from {}", endpoint.path()))
        })?;

        self.store
            .set(&access_token, response.refresh_token.as_deref())?;

        Ok(Session {
            access_token,
            refresh_token: response.refresh_token,
            user: response.user,
        })
    }

    // ===== Sign-in flows =====

    /// Log in with email and password
    pub async fn login(
        &self,
        credentials: &Credentials,
        remember_me: bool,
    ) -> Result<Session, AuthError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AuthError::Validation("Email and password required".to_string()));
        }

        debug!(email = %credentials.email, remember_me, "Attempting login");
        let body = LoginRequest {
            email: credentials.email.trim(),
            password: &credentials.password,
            remember_me,
        };
        let response: TokenResponse = self.post(Endpoint::Login, &body).await?;
        let session = self.persist(Endpoint::Login, response)?;
        info!(email = %credentials.email, "Login successful");
        Ok(session)
    }

    /// Create an account; the service signs the new user in immediately
    pub async fn register(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let email = credentials.email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }
        check_new_password(&credentials.password).map_err(AuthError::Validation)?;

        let body = RegisterRequest {
            email,
            password: &credentials.password,
        };
        let response: TokenResponse = self.post(Endpoint::Register, &body).await?;
        let session = self.persist(Endpoint::Register, response)?;
        info!(email = %email, "Registration successful");
        Ok(session)
    }

    /// Ask for a reset link. The reply never reveals whether the email is known.
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = email.trim();
        if !is_valid_email(email) {
            return Err(AuthError::Validation("Invalid email format".to_string()));
        }

        let url = self.endpoint_url(Endpoint::ForgotPassword)?;
        let response = self
            .client
            .post(url)
            .json(&ForgotPasswordRequest { email })
            .send()
            .await?;

        // An unknown account must look exactly like a known one
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Forgot-password target not found, answering generically");
            return Ok(FORGOT_PASSWORD_MESSAGE.to_string());
        }

        let response = Self::check_response(Endpoint::ForgotPassword, response).await?;
        let reply: MessageResponse = Self::read_json(Endpoint::ForgotPassword, response).await?;
        debug!(message = ?reply.message, "Forgot-password accepted");
        Ok(FORGOT_PASSWORD_MESSAGE.to_string())
    }

    /// Set a new password using the token from a reset link
    pub async fn reset_password(
        &self,
        token: &ResetToken,
        new_password: &str,
    ) -> Result<PasswordReset, AuthError> {
        if token.as_str().trim().is_empty() {
            return Err(AuthError::InvalidOrExpiredToken("Invalid reset token".to_string()));
        }
        if new_password.is_empty() {
            return Err(AuthError::Validation("New password required".to_string()));
        }

        let body = ResetPasswordRequest {
            token: token.as_str(),
            password: new_password,
        };
        let response: TokenResponse = self.post(Endpoint::ResetPassword, &body).await?;

        if response.access_token.as_deref().is_some_and(|t| !t.is_empty()) {
            let session = self.persist(Endpoint::ResetPassword, response)?;
            info!("Password reset, signed in with new tokens");
            Ok(PasswordReset::SignedIn(session))
        } else {
            info!("Password reset confirmed");
            Ok(PasswordReset::Confirmed {
                message: response
                    .message
                    .unwrap_or_else(|| "Password successfully reset".to_string()),
            })
        }
    }

    /// Fetch the Google consent page URL
    pub async fn google_auth_url(&self) -> Result<String, AuthError> {
        let url = self.endpoint_url(Endpoint::GoogleLogin)?;
        let response: GoogleLoginResponse = self.get(Endpoint::GoogleLogin, url).await?;
        Ok(response.auth_url)
    }

    /// Exchange the code from the Google redirect for a session
    pub async fn google_callback(&self, code: &str) -> Result<Session, AuthError> {
        if code.trim().is_empty() {
            return Err(AuthError::Validation("Missing authorization code".to_string()));
        }

        let mut url = self.endpoint_url(Endpoint::GoogleCallback)?;
        url.query_pairs_mut().append_pair("code", code.trim());

        let response: TokenResponse = self.get(Endpoint::GoogleCallback, url).await?;
        let session = self.persist(Endpoint::GoogleCallback, response)?;
        info!("Google sign-in successful");
        Ok(session)
    }

    // ===== Session checks =====

    /// Ask the service who owns `token`
    pub async fn validate(&self, token: &str) -> Result<UserProfile, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::Unauthorized);
        }
        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| AuthError::Unauthorized)?;

        let url = self.endpoint_url(Endpoint::Me)?;
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, auth_value)
            .send()
            .await?;
        let response = Self::check_response(Endpoint::Me, response).await?;

        let mut body: serde_json::Value = Self::read_json(Endpoint::Me, response).await?;
        // Some deployments wrap the profile in {"user": {...}}
        if let Some(user) = body
            .get_mut("user")
            .filter(|u| u.is_object())
            .map(serde_json::Value::take)
        {
            body = user;
        }
        serde_json::from_value(body).map_err(|e| {
            warn!(error = %e, "Unexpected profile shape");
            AuthError::InvalidResponse(format!("Failed to parse profile: {}", e))
        })
    }

    /// Validate whatever token is currently stored
    pub async fn current_user(&self) -> Result<UserProfile, AuthError> {
        match self.store.get()? {
            Some(token) => self.validate(&token).await,
            None => Err(AuthError::Unauthorized),
        }
    }

    /// Forget the stored tokens. Purely local.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }
}
