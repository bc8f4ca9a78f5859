//! Authentication module for managing the client-side session.
//!
//! This module provides:
//! - `TokenStore`: persistent home of the access/refresh token pair, with
//!   file, OS keychain and in-memory backends
//! - `RouteGuard`: per-navigation check of the stored token
//! - `bootstrap`: the start-up decision between dashboard and login
//!
//! Holding a token is not the same as being signed in; only the Auth
//! Service can confirm a token is still valid.

pub mod bootstrap;
pub mod guard;
pub mod session;
pub mod store;
pub mod validation;

pub use bootstrap::bootstrap;
pub use guard::{
    post_login_destination, resolve_session, GuardState, Navigation, PendingCheck, Route,
    RouteGuard, SessionStatus,
};
pub use session::{Credentials, ResetToken, Session, User, UserProfile};
pub use store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, StoreError, StoredTokens, TokenStore,
};
