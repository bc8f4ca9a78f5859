//! Planventure core library.
//!
//! Client-side session handling for the Planventure dashboard:
//!
//! - `auth::TokenStore` and its file, keychain and in-memory backends
//! - `api::AuthClient` for the login/register/password-reset/OAuth endpoints
//! - `auth::RouteGuard` and `auth::bootstrap` deciding where a navigation lands
//! - `config::Config` for the API location and preferred token backend

pub mod api;
pub mod auth;
pub mod config;

pub use api::{AuthClient, AuthError};
pub use auth::{
    bootstrap, resolve_session, Credentials, FileTokenStore, GuardState, KeyringTokenStore,
    MemoryTokenStore, Navigation, ResetToken, Route, RouteGuard, Session, SessionStatus,
    StoreError, TokenStore, User, UserProfile,
};
pub use config::{Config, TokenBackend};
