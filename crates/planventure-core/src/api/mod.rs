//! REST client module for the Planventure Auth Service.
//!
//! This module provides the `AuthClient` for the login, registration,
//! password-reset, Google OAuth and "who am I" endpoints.
//!
//! Authenticated calls use a bearer access token; the client persists the
//! tokens it receives through the injected `TokenStore`.

pub mod client;
pub mod error;

pub use client::{AuthClient, PasswordReset, FORGOT_PASSWORD_MESSAGE};
pub use error::{AuthError, Endpoint};
