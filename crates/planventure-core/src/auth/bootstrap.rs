use tracing::info;

use crate::api::AuthClient;

use super::guard::{resolve_session, Navigation, SessionStatus, DASHBOARD_PATH};

/// Decide where the application root sends the user on start.
///
/// The root path is not a protected view, so instead of rendering it this
/// forwards to the dashboard when the stored token checks out and to the
/// login page otherwise.
pub async fn bootstrap(client: &AuthClient) -> Navigation {
    match resolve_session(client).await {
        SessionStatus::Authenticated(profile) => {
            info!(user_id = profile.id, "Session restored");
            Navigation::Redirect {
                to: DASHBOARD_PATH.to_string(),
                from: None,
            }
        }
        SessionStatus::Unauthenticated => Navigation::to_login(None),
    }
}
