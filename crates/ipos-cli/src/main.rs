//! `ipos` - command-line harness for the IPos session node.
//!
//! Runs the node outside a workflow host: credentials come from the
//! command line, the OS keychain or a prompt, and the token is persisted
//! in the cache directory between runs.

mod keychain;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use ipos_core::{Config, Credentials, FileTokenStore, IPosNode, SessionManager, TokenStore};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use keychain::Keychain;

/// Environment variable that supplies the password non-interactively
const PASSWORD_ENV: &str = "IPOS_PASSWORD";

const USAGE: &str = "\
Usage: ipos <command> [email]

Commands:
  login [email]    Ensure a valid session, logging in if needed
  status           Show the cached session state
  whoami [email]   Ensure a session and print the current user
  forget [email]   Remove the stored password from the keychain";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to `log_file` when configured. The
/// returned guard must be held until exit so buffered file logs are flushed.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let name = path.file_name().unwrap_or_else(|| "ipos.log".as_ref());
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let _guard = init_tracing(config.log_file.as_deref());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str);
    let email_arg = args.get(1).cloned();

    let cache_dir = config.cache_dir()?;
    let store = Arc::new(FileTokenStore::new(cache_dir));
    let session = SessionManager::new(config.client()?, store.clone());

    match command {
        Some("login") => {
            let (credentials, source) = resolve_credentials(&config, email_arg)?;
            IPosNode::new(session)
                .execute(&credentials)
                .await
                .context("Login failed")?;
            remember(&mut config, &credentials, source);
            println!("Logged in as {}", credentials.identity);
        }
        Some("status") => {
            let state = session.state().await.context("Session check failed")?;
            println!("Session: {}", state);
            if let Some(record) = store.read()? {
                println!(
                    "Token obtained at {} ({} min until local expiry)",
                    record.obtained_at(),
                    record.minutes_until_expiry(Utc::now())
                );
            }
        }
        Some("whoami") => {
            let (credentials, source) = resolve_credentials(&config, email_arg)?;
            let user = session
                .current_user(&credentials)
                .await
                .context("Failed to fetch current user")?;
            remember(&mut config, &credentials, source);
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Some("forget") => {
            let email = email_arg
                .or_else(|| config.last_username.clone())
                .ok_or_else(|| anyhow::anyhow!("No email given and no last login known"))?;
            if Keychain::forget(&email)? {
                println!("Removed stored password for {}", email);
            } else {
                println!("No stored password for {}", email);
            }
        }
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }

    Ok(())
}

/// Where the password of a login came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordSource {
    Env,
    Keychain,
    Prompt,
}

impl PasswordSource {
    /// Only typed passwords are saved; env and keychain passwords stay where they are.
    fn should_save(self) -> bool {
        self == PasswordSource::Prompt
    }
}

/// Work out which credentials to log in with.
///
/// Email: argument, then the last used login, then a prompt. Password:
/// `IPOS_PASSWORD`, then the keychain, then a prompt.
fn resolve_credentials(
    config: &Config,
    email_arg: Option<String>,
) -> Result<(Credentials, PasswordSource)> {
    let email = match email_arg.or_else(|| config.last_username.clone()) {
        Some(email) => email,
        None => prompt_email()?,
    };

    let (password, source) = if let Ok(password) = std::env::var(PASSWORD_ENV) {
        (password, PasswordSource::Env)
    } else if let Some(password) = Keychain::password(&email)? {
        (password, PasswordSource::Keychain)
    } else {
        (rpassword::prompt_password("Password: ")?, PasswordSource::Prompt)
    };

    Ok((Credentials::new(email, password), source))
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

/// Persist the login that just succeeded. Failures only cost convenience.
fn remember(config: &mut Config, credentials: &Credentials, source: PasswordSource) {
    if source.should_save() {
        if let Err(e) = Keychain::save(credentials) {
            warn!(error = %e, "Failed to store credentials");
        }
    }

    config.last_username = Some(credentials.identity.clone());
    if let Err(e) = config.save() {
        warn!(error = %e, "Failed to save config");
    }
    info!(identity = %credentials.identity, "Session ready");
}
