//! Internhub CLI - a command-line client for the internhub API.
//!
//! Logs in with a role-specific endpoint, keeps the encrypted session in the
//! cache directory and sends authenticated requests that refresh expired
//! tokens on their own.

use std::io::{self, Write};

use anyhow::{anyhow, bail, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use internhub_core::{ApiClient, ApiError, ApiRequest, Config, CredentialStatus, Role};

// ============================================================================
// Constants
// ============================================================================

const USAGE: &str = "\
Usage: internhub <command> [args]

Commands:
  login [role] [email]   Log in (role: admin, student, teacher, company)
  status                 Show whether the stored session is still valid
  whoami                 Show the logged-in user
  get <path>             Send an authenticated GET request and print the body
  logout                 Remove the stored session

Environment:
  INTERNHUB_TOKEN_KEY    Passphrase for the token vault (required)
  INTERNHUB_API_URL      Override the API base URL
  RUST_LOG               Log filter, e.g. RUST_LOG=internhub_core=debug";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes buffered log lines on drop and has to live
/// until the end of main.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load()?;
    let api = ApiClient::from_config(&config)?;
    info!(command, base_url = api.base_url(), "internhub starting");

    match command {
        "login" => login(&api, &mut config, &args[1..]).await,
        "status" => status(&api),
        "whoami" => whoami(&api),
        "get" => {
            let path = args.get(1).ok_or_else(|| anyhow!("get requires a path"))?;
            get(&api, path).await
        }
        "logout" => {
            api.end_session()?;
            println!("Logged out");
            Ok(())
        }
        other => bail!("Unknown command '{}'\n\n{}", other, USAGE),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn login(api: &ApiClient, config: &mut Config, args: &[String]) -> Result<()> {
    let role = match args.first() {
        Some(raw) => Role::parse(raw).ok_or_else(|| anyhow!("Unknown role '{}'", raw))?,
        None => config.last_role.unwrap_or(Role::Student),
    };

    let email = match args.get(1).cloned().or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt_email()?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
    if email.is_empty() || password.is_empty() {
        bail!("Email and password required");
    }

    let profile = api.login(role, &email, &password).await?;

    config.last_email = Some(email.clone());
    config.last_role = Some(role);
    config.save()?;

    let name = profile.as_ref().map(|p| p.display_name()).unwrap_or(&email);
    println!("Logged in as {} ({})", name, role);
    Ok(())
}

fn prompt_email() -> Result<String> {
    print!("Email: ");
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    Ok(email.trim().to_string())
}

fn status(api: &ApiClient) -> Result<()> {
    match api.credential_status() {
        CredentialStatus::Absent => println!("Not logged in"),
        CredentialStatus::Expired => println!("Session expired - run `internhub login`"),
        CredentialStatus::Live { claims } => {
            let expires_at = claims.expires_at();
            let who = claims.email.or(claims.sub).unwrap_or_else(|| "unknown user".to_string());
            match expires_at {
                Some(at) => println!("Logged in as {} until {}", who, at.to_rfc3339()),
                None => println!("Logged in as {}", who),
            }
        }
    }
    Ok(())
}

fn whoami(api: &ApiClient) -> Result<()> {
    match api.current_user() {
        Some(user) => println!("{}", serde_json::to_string_pretty(&user)?),
        None => println!("Not logged in"),
    }
    Ok(())
}

async fn get(api: &ApiClient, path: &str) -> Result<()> {
    let response = match api.send(ApiRequest::get(path)).await {
        Ok(response) => response,
        Err(e) if e.requires_login() => bail!("{} - run `internhub login`", e),
        Err(e) => return Err(e.into()),
    };

    let status = response.status();
    let body = response.text().await.map_err(ApiError::from)?;
    let pretty = serde_json::from_str::<serde_json::Value>(&body)
        .and_then(|value| serde_json::to_string_pretty(&value))
        .unwrap_or(body);

    if !status.is_success() {
        eprintln!("HTTP {}", status);
    }
    println!("{}", pretty);
    Ok(())
}
