//! # Gatehouse CLI
//!
//! Logs a user in from the terminal, using either phone + SMS code behind a
//! click captcha or a WeChat QR code.
//!
//! ```text
//! gatehouse login [--method phone|wechat]
//! gatehouse status
//! gatehouse logout
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use gatehouse::navigate::WatchNavigator;
use gatehouse::notify::{Notifier, TracingNotifier};
use gatehouse::storage::{FileStore, TokenStore};
use gatehouse::{AppConfig, AppState, ConfigOverrides, LoginMethod, LoginPage};
use gatehouse_common::constants::TOKEN_STORAGE_KEY;

mod terminal;

use terminal::TerminalNotifier;

/// Gatehouse - login client
#[derive(Parser, Debug)]
#[command(name = "gatehouse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config/gatehouse.toml")]
    config: String,

    /// Backend base URL (overrides config)
    #[arg(long, env = "GATEHOUSE_API_BASE_URL")]
    api_base: Option<String>,

    /// Storage file path (overrides config)
    #[arg(long, env = "GATEHOUSE_STORAGE_PATH")]
    storage: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "LOG_LEVEL")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in interactively
    Login {
        /// Login method to start with
        #[arg(long, value_enum, default_value_t = LoginMethod::Wechat)]
        method: LoginMethod,
    },
    /// Show whether a credential is stored
    Status,
    /// Remove the stored credential
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so env-backed arguments can see it
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    info!("Starting Gatehouse v{}", env!("CARGO_PKG_VERSION"));

    let overrides = ConfigOverrides {
        api_base_url: args.api_base.clone(),
        storage_path: args.storage.clone(),
    };
    let config = AppConfig::load(&args.config, &overrides)?;
    info!(path = %args.config, api = %config.api_base_url, "Configuration loaded");

    match args.command {
        Command::Login { method } => login(config, method, args.json_logs).await,
        Command::Status => status(&config),
        Command::Logout => logout(&config),
    }
}

async fn login(config: AppConfig, method: LoginMethod, json_logs: bool) -> Result<()> {
    let image_dir = image_dir(&config.storage_path);
    let auth_disabled = config.auth_disabled();
    let navigator = Arc::new(WatchNavigator::new());

    // Structured log consumers get notices as log events instead of text.
    let notifier: Arc<dyn Notifier> = if json_logs {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(TerminalNotifier)
    };
    let state = AppState::new(config, notifier, navigator.clone())?;
    let mut page = LoginPage::mount(state, method).await;

    if page.is_redirected() {
        if auth_disabled {
            println!("Authentication is disabled; nothing to do.");
        } else {
            println!("Already logged in.");
        }
        return Ok(());
    }

    let logged_in = tokio::select! {
        result = terminal::run_login(&mut page, &navigator, &image_dir) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            false
        }
    };

    if let Some(icp) = page.icp_number() {
        eprintln!("{icp}");
    }

    if logged_in {
        println!("Logged in.");
    } else {
        println!("Login cancelled.");
    }
    Ok(())
}

fn status(config: &AppConfig) -> Result<()> {
    if config.auth_disabled() {
        println!("Authentication is disabled.");
        return Ok(());
    }

    let store = FileStore::new(&config.storage_path);
    match store.token().context("Failed to read storage")? {
        Some(token) if !token.is_empty() => println!("Logged in (token {}).", mask(&token)),
        _ => println!("Not logged in."),
    }

    if let Some(icp) = &config.icp_number {
        println!("{icp}");
    }
    Ok(())
}

fn logout(config: &AppConfig) -> Result<()> {
    FileStore::new(&config.storage_path)
        .remove(TOKEN_STORAGE_KEY)
        .context("Failed to clear stored credential")?;
    println!("Logged out.");
    Ok(())
}

/// Captcha images are written next to the storage file
fn image_dir(storage_path: &Path) -> PathBuf {
    storage_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn mask(token: &str) -> String {
    let tail: String = token
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("…{tail}")
}

/// Initialize structured logging with tracing
fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
