//! Planventure CLI - drive the dashboard's sign-in flows from a terminal.
//!
//! Each page of the dashboard's authentication surface is a subcommand;
//! `start` and `open` run the same session checks the application does on
//! load and on navigation.

mod commands;

use std::io;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::Context;

#[derive(Debug, Parser)]
#[command(name = "planventure", version, about = "Planventure dashboard session tool")]
struct Cli {
    /// Base URL of the Auth Service
    #[arg(long, env = "PLANVENTURE_API_URL", global = true)]
    api_url: Option<String>,

    /// Where tokens are kept (defaults to the configured backend)
    #[arg(long, value_enum, global = true)]
    store: Option<StoreKind>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    File,
    Keyring,
    /// Keep tokens only for the lifetime of this process
    Memory,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decide where the application opens: dashboard or login
    Start,
    /// Navigate to a path, checking the session for protected views
    Open { path: String },
    /// Log in with email and password
    Login {
        #[arg(long, env = "PLANVENTURE_EMAIL")]
        email: Option<String>,
        #[arg(long)]
        remember_me: bool,
        /// Path to return to after logging in
        #[arg(long)]
        from: Option<String>,
    },
    /// Create an account
    Register {
        #[arg(long, env = "PLANVENTURE_EMAIL")]
        email: Option<String>,
    },
    /// Request a password reset link
    ForgotPassword {
        #[arg(long, env = "PLANVENTURE_EMAIL")]
        email: Option<String>,
    },
    /// Set a new password from a reset link or token
    ResetPassword {
        /// Full reset link as received by email
        #[arg(long, conflicts_with = "token")]
        link: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
    /// Print the Google sign-in URL
    GoogleLogin,
    /// Finish Google sign-in with the code from the redirect
    GoogleCallback {
        #[arg(long)]
        code: String,
    },
    /// Show the account behind the stored token
    Whoami,
    /// Forget the stored tokens
    Logout,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_tracing();
    info!("Planventure CLI starting");
    debug!(command = ?cli.command, "Parsed arguments");

    let mut ctx = Context::new(cli.api_url.as_deref(), cli.store)?;

    match cli.command {
        Command::Start => commands::start(&ctx).await,
        Command::Open { path } => commands::open(&ctx, &path).await,
        Command::Login {
            email,
            remember_me,
            from,
        } => commands::login(&mut ctx, email, remember_me, from.as_deref()).await,
        Command::Register { email } => commands::register(&mut ctx, email).await,
        Command::ForgotPassword { email } => commands::forgot_password(&ctx, email).await,
        Command::ResetPassword { link, token } => {
            commands::reset_password(&ctx, link.as_deref(), token).await
        }
        Command::GoogleLogin => commands::google_login(&ctx).await,
        Command::GoogleCallback { code } => commands::google_callback(&ctx, &code).await,
        Command::Whoami => commands::whoami(&ctx).await,
        Command::Logout => commands::logout(&ctx),
    }
}
