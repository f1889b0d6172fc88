//! sessionkeeper - sign in to the billing backend and keep an eye on the
//! session from the terminal.

mod commands;
mod router;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sessionkeeper_core::config::Config;

use commands::{Command, LoginArgs, WatchArgs};

/// Directory for an additional daily-rotated log file.
const ENV_LOG_DIR: &str = "SESSIONKEEPER_LOG_DIR";

const USAGE: &str = "\
Usage: sessionkeeper <command> [options]

Commands:
  login [--email <email>] [--remember | --no-remember]
                     Sign in and store the session token
  status             Show the stored session and time remaining
  refresh            Extend the stored session
  logout             Clear the stored session
  watch [--auto-refresh]
                     Restore the session and count down until it ends

Environment:
  SESSIONKEEPER_API_URL   Backend base URL
  SESSIONKEEPER_EMAIL     Default email for login
  SESSIONKEEPER_LOG_DIR   Also write logs to this directory
  RUST_LOG                Log filter (default: warn)";

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "sessionkeeper.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(name) = args.first() else {
        return Ok(Command::Help);
    };
    let rest = &args[1..];

    let command = match name.as_str() {
        "login" => {
            let mut login = LoginArgs::default();
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--remember" => login.remember = Some(true),
                    "--no-remember" => login.remember = Some(false),
                    "--email" => {
                        let email = iter
                            .next()
                            .ok_or_else(|| anyhow::anyhow!("--email requires a value"))?;
                        login.email = Some(email.clone());
                    }
                    other => anyhow::bail!("Unknown option for login: {}", other),
                }
            }
            Command::Login(login)
        }
        "status" => Command::Status,
        "refresh" => Command::Refresh,
        "logout" => Command::Logout,
        "watch" => {
            let mut watch = WatchArgs::default();
            for arg in rest {
                match arg.as_str() {
                    "--auto-refresh" => watch.auto_refresh = true,
                    other => anyhow::bail!("Unknown option for watch: {}", other),
                }
            }
            Command::Watch(watch)
        }
        "help" | "--help" | "-h" => Command::Help,
        other => anyhow::bail!("Unknown command: {}\n\n{}", other, USAGE),
    };
    Ok(command)
}

fn load_config() -> Config {
    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    };
    config.apply_env();
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;
    if matches!(command, Command::Help) {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = load_config();
    info!(api = %config.api_base_url, ?command, "sessionkeeper starting");

    commands::run(command, config).await
}
