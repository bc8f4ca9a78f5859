use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use planventure_core::api::PasswordReset;
use planventure_core::auth::post_login_destination;
use planventure_core::{
    bootstrap, AuthClient, AuthError, Config, Credentials, FileTokenStore, KeyringTokenStore,
    MemoryTokenStore, Navigation, ResetToken, RouteGuard, TokenBackend, TokenStore,
};
use tracing::{error, warn};
use url::Url;

use crate::StoreKind;

/// Environment variable consulted before prompting for a password
const PASSWORD_ENV: &str = "PLANVENTURE_PASSWORD";

/// Everything a command needs: the loaded config and a client bound to the
/// chosen token store.
pub struct Context {
    pub config: Config,
    pub client: AuthClient,
}

impl Context {
    pub fn new(api_url: Option<&str>, store: Option<StoreKind>) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let base_url = match api_url {
            Some(raw) => Url::parse(raw).with_context(|| format!("Invalid API URL: {}", raw))?,
            None => config.api_base_url()?,
        };

        let kind = store.unwrap_or(match config.token_backend {
            TokenBackend::File => StoreKind::File,
            TokenBackend::Keyring => StoreKind::Keyring,
        });
        let store: Arc<dyn TokenStore> = match kind {
            StoreKind::File => Arc::new(FileTokenStore::new(config.data_dir()?)),
            StoreKind::Keyring => Arc::new(KeyringTokenStore::new()),
            StoreKind::Memory => Arc::new(MemoryTokenStore::new()),
        };

        let client = AuthClient::new(base_url, store).context("Failed to create HTTP client")?;
        Ok(Self { config, client })
    }

    fn remember_email(&mut self, email: &str) {
        self.config.last_email = Some(email.to_string());
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }
    }
}

/// Turn a failed call into the message the user should see
fn fail(action: &str, e: AuthError) -> anyhow::Error {
    error!(error = %e, "{} failed", action);
    anyhow::anyhow!("{} failed: {}", action, e.user_message())
}

pub fn describe(nav: &Navigation) -> String {
    match nav {
        Navigation::Render { route, user } => match user {
            Some(user) => format!("Showing {} as {}", route.path(), user.email),
            None => format!("Showing {}", route.path()),
        },
        Navigation::Redirect { to, from } => match from {
            Some(from) => format!("Redirecting to {} (return to {})", to, from),
            None => format!("Redirecting to {}", to),
        },
    }
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_email(given: Option<String>, fallback: Option<&str>) -> Result<String> {
    if let Some(email) = given.filter(|e| !e.trim().is_empty()) {
        return Ok(email);
    }
    match fallback {
        Some(last) => {
            let input = prompt_line(&format!("Email [{}]", last))?;
            Ok(if input.is_empty() { last.to_string() } else { input })
        }
        None => prompt_line("Email"),
    }
}

fn prompt_password(label: &str) -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    Ok(rpassword::prompt_password(format!("{}: ", label))?)
}

/// Ask twice for a new password and insist both match
fn prompt_new_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(password);
    }
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

pub async fn start(ctx: &Context) -> Result<()> {
    let nav = bootstrap(&ctx.client).await;
    println!("{}", describe(&nav));
    Ok(())
}

pub async fn open(ctx: &Context, path: &str) -> Result<()> {
    let mut guard = RouteGuard::new(ctx.client.clone());
    let nav = guard.navigate(path).await;
    println!("{}", describe(&nav));
    Ok(())
}

pub async fn login(
    ctx: &mut Context,
    email: Option<String>,
    remember_me: bool,
    from: Option<&str>,
) -> Result<()> {
    let email = prompt_email(email, ctx.config.last_email.as_deref())?;
    let password = prompt_password("Password")?;
    let credentials = Credentials::new(email, password);

    let session = ctx
        .client
        .login(&credentials, remember_me)
        .await
        .map_err(|e| fail("Login", e))?;

    ctx.remember_email(&credentials.email);
    match session.user {
        Some(user) => println!("Logged in as {} (id {})", user.email, user.id),
        None => println!("Logged in as {}", credentials.email),
    }
    println!("Continue at {}", post_login_destination(from));
    Ok(())
}

pub async fn register(ctx: &mut Context, email: Option<String>) -> Result<()> {
    let email = prompt_email(email, None)?;
    let password = prompt_new_password()?;
    let credentials = Credentials::new(email, password);

    ctx.client
        .register(&credentials)
        .await
        .map_err(|e| fail("Registration", e))?;

    ctx.remember_email(&credentials.email);
    println!("Account created for {}", credentials.email);
    println!("Continue at {}", post_login_destination(None));
    Ok(())
}

pub async fn forgot_password(ctx: &Context, email: Option<String>) -> Result<()> {
    let email = prompt_email(email, ctx.config.last_email.as_deref())?;
    let message = ctx
        .client
        .forgot_password(&email)
        .await
        .map_err(|e| fail("Password reset request", e))?;
    println!("{}", message);
    Ok(())
}

pub async fn reset_password(
    ctx: &Context,
    link: Option<&str>,
    token: Option<String>,
) -> Result<()> {
    let token = match (link, token) {
        (Some(link), _) => ResetToken::from_link(link)
            .ok_or_else(|| anyhow::anyhow!("This password reset link is invalid or has expired."))?,
        (None, Some(token)) => ResetToken::new(token),
        (None, None) => ResetToken::new(prompt_line("Reset token")?),
    };
    let password = prompt_new_password()?;

    match ctx
        .client
        .reset_password(&token, &password)
        .await
        .map_err(|e| fail("Password reset", e))?
    {
        PasswordReset::SignedIn(_) => {
            println!("Password has been reset. You are now logged in.");
            println!("Continue at {}", post_login_destination(None));
        }
        PasswordReset::Confirmed { message } => {
            println!("{}", message);
            println!("Please log in with your new password.");
        }
    }
    Ok(())
}

pub async fn google_login(ctx: &Context) -> Result<()> {
    let url = ctx
        .client
        .google_auth_url()
        .await
        .map_err(|e| fail("Google login", e))?;
    println!("Open this URL to sign in with Google:\n{}", url);
    Ok(())
}

pub async fn google_callback(ctx: &Context, code: &str) -> Result<()> {
    ctx.client
        .google_callback(code)
        .await
        .map_err(|e| fail("Google login", e))?;
    println!("Signed in with Google");
    println!("Continue at {}", post_login_destination(None));
    Ok(())
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let profile = ctx
        .client
        .current_user()
        .await
        .map_err(|e| fail("Session check", e))?;
    println!("{} (id {})", profile.email, profile.id);

    if let Ok(Some(stored)) = ctx.client.store().load() {
        if let Some(saved_at) = stored.saved_at {
            println!("Signed in since {}", saved_at.format("%b %d, %Y %H:%M UTC"));
        }
    }
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    ctx.client.logout().map_err(|e| fail("Logout", e))?;
    println!("Logged out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use planventure_core::Route;

    #[test]
    fn test_describe_navigation() {
        let nav = Navigation::Render {
            route: Route::Login,
            user: None,
        };
        assert_eq!(describe(&nav), "Showing /login");

        let nav = Navigation::to_login(Some("/dashboard"));
        assert_eq!(describe(&nav), "Redirecting to /login (return to /dashboard)");

        let nav = Navigation::Redirect {
            to: "/dashboard".to_string(),
            from: None,
        };
        assert_eq!(describe(&nav), "Redirecting to /dashboard");
    }

    #[test]
    fn test_prompt_email_prefers_given_value() {
        let email = prompt_email(Some("user@example.com".to_string()), Some("old@example.com"))
            .unwrap();
        assert_eq!(email, "user@example.com");
    }
}
