//! Route protection.
//!
//! Every navigation to a protected view re-validates the stored token
//! against the Auth Service. Nothing is cached between navigations and no
//! local expiry clock is trusted.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::AuthClient;

use super::UserProfile;

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Views of the dashboard application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Root,
    Login,
    Register,
    ForgotPassword,
    ResetPassword,
    Dashboard,
    Documentation,
    TopVariances,
    NotFound(String),
}

impl Route {
    /// Resolve a path such as `/dashboard` or `/reset-password?token=x`
    pub fn parse(path: &str) -> Self {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Route::Root,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/forgot-password" => Route::ForgotPassword,
            "/reset-password" => Route::ResetPassword,
            "/dashboard" => Route::Dashboard,
            "/documentation" => Route::Documentation,
            "/documentation/top-variances" => Route::TopVariances,
            other => Route::NotFound(other.to_string()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Route::Root => ROOT_PATH,
            Route::Login => LOGIN_PATH,
            Route::Register => "/register",
            Route::ForgotPassword => "/forgot-password",
            Route::ResetPassword => "/reset-password",
            Route::Dashboard => DASHBOARD_PATH,
            Route::Documentation => "/documentation",
            Route::TopVariances => "/documentation/top-variances",
            Route::NotFound(path) => path,
        }
    }

    pub fn is_protected(&self) -> bool {
        matches!(
            self,
            Route::Dashboard | Route::Documentation | Route::TopVariances
        )
    }

    /// Sign-in pages, reachable without a session
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Route::Login | Route::Register | Route::ForgotPassword | Route::ResetPassword
        )
    }
}

/// Result of reconciling the stored token with the server.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStatus {
    Authenticated(UserProfile),
    Unauthenticated,
}

/// Decide whether the stored token is still good.
///
/// An empty store answers `Unauthenticated` without touching the network,
/// and is cleared so no stray refresh token survives. Any failure, including an unreachable server, counts as unauthenticated
/// and clears the store.
pub async fn resolve_session(client: &AuthClient) -> SessionStatus {
    let token = match client.store().get() {
        Ok(Some(token)) => token,
        Ok(None) => {
            debug!("No stored token");
            forget(client);
            return SessionStatus::Unauthenticated;
        }
        Err(e) => {
            warn!(error = %e, "Failed to read stored token");
            forget(client);
            return SessionStatus::Unauthenticated;
        }
    };

    match client.validate(&token).await {
        Ok(profile) => {
            debug!(user_id = profile.id, "Stored token accepted");
            SessionStatus::Authenticated(profile)
        }
        Err(e) => {
            info!(error = %e, "Stored token rejected, clearing session");
            forget(client);
            SessionStatus::Unauthenticated
        }
    }
}

fn forget(client: &AuthClient) {
    if let Err(e) = client.store().clear() {
        warn!(error = %e, "Failed to clear stored tokens");
    }
}

/// Where a navigation ends up.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// Show the view; `user` is set when the view required a session
    Render {
        route: Route,
        user: Option<UserProfile>,
    },
    /// Go elsewhere, remembering the path originally asked for
    Redirect { to: String, from: Option<String> },
}

impl Navigation {
    pub fn to_login(from: Option<&str>) -> Self {
        Navigation::Redirect {
            to: LOGIN_PATH.to_string(),
            from: from.map(str::to_string),
        }
    }
}

/// Where to send the user after a successful login: back to the protected
/// view they were bounced from, otherwise the dashboard.
pub fn post_login_destination(from: Option<&str>) -> String {
    match from {
        Some(path) if Route::parse(path).is_protected() => path.to_string(),
        _ => DASHBOARD_PATH.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GuardState {
    #[default]
    Unknown,
    Checking,
    Authenticated(UserProfile),
    Unauthenticated,
}

pub struct RouteGuard {
    client: AuthClient,
    state: GuardState,
}

impl RouteGuard {
    pub fn new(client: AuthClient) -> Self {
        Self {
            client,
            state: GuardState::Unknown,
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Decide what a navigation to `path` shows
    pub async fn navigate(&mut self, path: &str) -> Navigation {
        self.state = GuardState::Unknown;
        let route = Route::parse(path);

        if route == Route::Root {
            return super::bootstrap(&self.client).await;
        }
        if !route.is_protected() {
            debug!(path = route.path(), "Unprotected route");
            return Navigation::Render { route, user: None };
        }

        self.state = GuardState::Checking;
        match resolve_session(&self.client).await {
            SessionStatus::Authenticated(profile) => {
                self.state = GuardState::Authenticated(profile.clone());
                Navigation::Render {
                    route,
                    user: Some(profile),
                }
            }
            SessionStatus::Unauthenticated => {
                self.state = GuardState::Unauthenticated;
                info!(from = path, "Redirecting to login");
                Navigation::to_login(Some(path))
            }
        }
    }

    /// Run a check for `path` on a background task.
    ///
    /// Dropping the returned handle cancels the check. This guard's own state
    /// is not touched.
    pub fn check_in_background(&self, path: &str) -> PendingCheck {
        let client = self.client.clone();
        let path = path.to_string();
        let handle = tokio::spawn(async move { RouteGuard::new(client).navigate(&path).await });
        PendingCheck { handle }
    }
}

/// A guard check running on a background task.
pub struct PendingCheck {
    handle: JoinHandle<Navigation>,
}

impl PendingCheck {
    /// Wait for the check. `None` if the task was cancelled or panicked.
    pub async fn outcome(mut self) -> Option<Navigation> {
        (&mut self.handle).await.ok()
    }
}

impl Drop for PendingCheck {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryTokenStore, TokenStore};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn guard_for(server: &MockServer) -> (RouteGuard, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        let client = AuthClient::new(Url::parse(&server.uri()).unwrap(), store.clone()).unwrap();
        (RouteGuard::new(client), store)
    }

    async fn mount_me(server: &MockServer, token: &str, status: u16) {
        let template = if status == 200 {
            ResponseTemplate::new(200).set_body_json(json!({"id": 1, "email": "user@example.com"}))
        } else {
            ResponseTemplate::new(status).set_body_json(json!({"message": "Token has expired"}))
        };
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[test]
    fn test_route_parse() {
        assert_eq!(Route::parse("/"), Route::Root);
        assert_eq!(Route::parse(""), Route::Root);
        assert_eq!(Route::parse("/dashboard/"), Route::Dashboard);
        assert_eq!(Route::parse("/reset-password?token=abc"), Route::ResetPassword);
        assert_eq!(Route::parse("/documentation/top-variances"), Route::TopVariances);
        assert_eq!(Route::parse("/nope"), Route::NotFound("/nope".to_string()));

        assert!(Route::Dashboard.is_protected());
        assert!(!Route::Login.is_protected());
        assert!(Route::Login.is_public());
        assert!(!Route::NotFound("/x".to_string()).is_public());
    }

    #[test]
    fn test_post_login_destination() {
        assert_eq!(post_login_destination(Some("/documentation")), "/documentation");
        assert_eq!(post_login_destination(Some("/login")), DASHBOARD_PATH);
        assert_eq!(post_login_destination(Some("/unknown")), DASHBOARD_PATH);
        assert_eq!(post_login_destination(None), DASHBOARD_PATH);
    }

    #[tokio::test]
    async fn test_empty_store_redirects_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut guard, _store) = guard_for(&server);
        let nav = guard.navigate("/dashboard").await;
        assert_eq!(nav, Navigation::to_login(Some("/dashboard")));
        assert_eq!(guard.state(), &GuardState::Unauthenticated);
    }

    /// Holds a refresh token with no access token and counts clears.
    #[derive(Default)]
    struct OrphanRefreshStore {
        refresh: std::sync::Mutex<Option<String>>,
        clears: std::sync::atomic::AtomicUsize,
    }

    impl TokenStore for OrphanRefreshStore {
        fn load(&self) -> Result<Option<crate::auth::StoredTokens>, crate::auth::StoreError> {
            Ok(None)
        }

        fn set(&self, _access: &str, _refresh: Option<&str>) -> Result<(), crate::auth::StoreError> {
            Ok(())
        }

        fn clear(&self) -> Result<(), crate::auth::StoreError> {
            self.clears.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            *self.refresh.lock().unwrap() = None;
            Ok(())
        }

        fn refresh_token(&self) -> Result<Option<String>, crate::auth::StoreError> {
            Ok(self.refresh.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn test_empty_store_is_cleared_of_stray_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = Arc::new(OrphanRefreshStore::default());
        *store.refresh.lock().unwrap() = Some("R1".to_string());
        let client = AuthClient::new(Url::parse(&server.uri()).unwrap(), store.clone()).unwrap();

        assert_eq!(resolve_session(&client).await, SessionStatus::Unauthenticated);
        assert_eq!(store.clears.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(store.refresh_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_valid_token_renders_view() {
        let server = MockServer::start().await;
        mount_me(&server, "T1", 200).await;

        let (mut guard, store) = guard_for(&server);
        store.set("T1", Some("R1")).unwrap();

        let nav = guard.navigate("/documentation").await;
        match nav {
            Navigation::Render { route, user } => {
                assert_eq!(route, Route::Documentation);
                assert_eq!(user.map(|u| u.email).as_deref(), Some("user@example.com"));
            }
            other => panic!("expected render, got {:?}", other),
        }
        assert!(matches!(guard.state(), GuardState::Authenticated(_)));
        assert_eq!(store.get().unwrap().as_deref(), Some("T1"));
    }

    #[tokio::test]
    async fn test_expired_token_clears_store_and_keeps_path() {
        let server = MockServer::start().await;
        mount_me(&server, "expired-token", 401).await;

        let (mut guard, store) = guard_for(&server);
        store.set("expired-token", Some("R1")).unwrap();

        let nav = guard.navigate("/dashboard").await;
        assert_eq!(
            nav,
            Navigation::Redirect {
                to: "/login".to_string(),
                from: Some("/dashboard".to_string()),
            }
        );
        assert_eq!(guard.state(), &GuardState::Unauthenticated);
        assert_eq!(store.get().unwrap(), None);
        assert_eq!(store.refresh_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_every_navigation_revalidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 1, "email": "u@example.com"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let (mut guard, store) = guard_for(&server);
        store.set("T1", None).unwrap();
        guard.navigate("/dashboard").await;
        guard.navigate("/dashboard").await;
    }

    #[tokio::test]
    async fn test_logout_then_check_is_never_authenticated() {
        let server = MockServer::start().await;
        mount_me(&server, "T1", 200).await;

        let (mut guard, store) = guard_for(&server);
        store.set("T1", Some("R1")).unwrap();
        assert!(matches!(
            guard.navigate("/dashboard").await,
            Navigation::Render { .. }
        ));

        guard.client.logout().unwrap();
        let nav = guard.navigate("/dashboard").await;
        assert_eq!(nav, Navigation::to_login(Some("/dashboard")));
        assert!(!matches!(guard.state(), GuardState::Authenticated(_)));
    }

    #[tokio::test]
    async fn test_public_routes_skip_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let (mut guard, _store) = guard_for(&server);
        assert_eq!(
            guard.navigate("/register").await,
            Navigation::Render {
                route: Route::Register,
                user: None
            }
        );
        assert_eq!(
            guard.navigate("/missing").await,
            Navigation::Render {
                route: Route::NotFound("/missing".to_string()),
                user: None
            }
        );
        assert_eq!(guard.state(), &GuardState::Unknown);
    }

    #[tokio::test]
    async fn test_background_check_completes() {
        let server = MockServer::start().await;
        mount_me(&server, "T1", 200).await;

        let (guard, store) = guard_for(&server);
        store.set("T1", None).unwrap();

        let outcome = guard.check_in_background("/dashboard").outcome().await;
        assert!(matches!(outcome, Some(Navigation::Render { .. })));
    }

    #[tokio::test]
    async fn test_dropped_background_check_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/me"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(300)))
            .mount(&server)
            .await;

        let (guard, store) = guard_for(&server);
        store.set("T1", None).unwrap();

        let pending = guard.check_in_background("/dashboard");
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(pending);
        tokio::time::sleep(Duration::from_millis(500)).await;

        // The aborted check never got to clear the store
        assert_eq!(store.get().unwrap().as_deref(), Some("T1"));
    }
}
