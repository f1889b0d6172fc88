use std::io::{self, Write};

use anyhow::{Context, Result};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use sessionkeeper_core::api::RetryPolicy;
use sessionkeeper_core::auth::{
    decode_claims, AuthState, Route, RouteDecision, SessionError, SessionStatus, WarningEvent,
};
use sessionkeeper_core::config::Config;
use sessionkeeper_core::models::Profile;
use sessionkeeper_core::navigation::Redirect;
use sessionkeeper_core::utils::{
    format_countdown, format_minutes_left, format_timestamp, mask_token, truncate_string,
};
use sessionkeeper_core::SessionContext;

use crate::router;

/// Route the watch view occupies; a stored session is required to enter it.
const WATCH_ROUTE: &str = "/session";

/// Company names beyond this are cut in the profile summary.
const MAX_COMPANY_DISPLAY_LEN: usize = 40;

#[derive(Debug)]
pub enum Command {
    Login(LoginArgs),
    Status,
    Refresh,
    Logout,
    Watch(WatchArgs),
    Help,
}

#[derive(Debug, Default)]
pub struct LoginArgs {
    pub email: Option<String>,
    /// Overrides the remembered choice when given.
    pub remember: Option<bool>,
}

#[derive(Debug, Default)]
pub struct WatchArgs {
    pub auto_refresh: bool,
}

pub async fn run(command: Command, config: Config) -> Result<()> {
    let (mut ctx, mut redirects) = SessionContext::from_config(config)?;

    match command {
        Command::Login(args) => login(&mut ctx, &mut redirects, args).await,
        Command::Status => status(&ctx),
        Command::Refresh => refresh(&ctx, &mut redirects).await,
        Command::Logout => {
            ctx.coordinator.logout();
            println!("Signed out.");
            Ok(())
        }
        Command::Watch(args) => watch(&ctx, &mut redirects, args).await,
        Command::Help => Ok(()),
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn login(
    ctx: &mut SessionContext,
    redirects: &mut UnboundedReceiver<Redirect>,
    args: LoginArgs,
) -> Result<()> {
    ensure_backend(ctx).await?;

    println!("\n=== Sign in to {} ===\n", ctx.api.base_url());

    let email = match args.email {
        Some(email) => email,
        None => prompt_email(ctx.config.last_email.as_deref())?,
    };
    if email.is_empty() {
        anyhow::bail!("Email required");
    }
    let remember = args.remember.unwrap_or(ctx.config.remember_me);
    let password = rpassword::prompt_password("Password: ")?;

    println!("\nAuthenticating...");
    let profile = match ctx.coordinator.authenticate(&email, &password, remember).await {
        Ok(profile) => profile,
        Err(SessionError::LoginRejected(e)) => {
            warn!(error = %e, "Login rejected");
            anyhow::bail!("Invalid email or password");
        }
        Err(e) => {
            router::report_pending(redirects);
            return Err(e).context("Login failed");
        }
    };

    ctx.config.last_email = Some(email);
    ctx.config.remember_me = remember;
    if let Err(e) = ctx.config.save() {
        warn!(error = %e, "Failed to save config");
    }

    println!("Login successful!\n");
    print_profile(&profile);

    if remember {
        return Ok(());
    }
    // Ephemeral sessions live only as long as this process.
    println!("\nSession is not remembered; watching until it ends (Ctrl-C to quit).");
    watch_session(ctx, redirects, &WatchArgs::default()).await
}

fn status(ctx: &SessionContext) -> Result<()> {
    match ctx.clock.status() {
        SessionStatus::NoSession => println!("No active session."),
        SessionStatus::Expired => println!("Session expired."),
        SessionStatus::Active { remaining_ms } => {
            let Some(token) = ctx.store.read() else {
                println!("No active session.");
                return Ok(());
            };
            let claims = decode_claims(&token)?;
            print_profile(&claims.to_profile());
            println!(
                "Expires:  {} ({} left)",
                format_timestamp(claims.expires_at()?),
                format_countdown(remaining_ms)
            );
            if let Some(tier) = ctx.store.tier() {
                println!("Storage:  {:?}", tier);
            }
            println!("Token:    {}", mask_token(&token));
        }
    }
    Ok(())
}

async fn refresh(ctx: &SessionContext, redirects: &mut UnboundedReceiver<Redirect>) -> Result<()> {
    ensure_backend(ctx).await?;

    if !restore_session(ctx).await.is_logged_in() {
        router::report_pending(redirects);
        anyhow::bail!("No active session. Run `sessionkeeper login` first.");
    }

    match ctx.coordinator.refresh().await {
        Ok(expires_at) => {
            println!("Session extended until {}.", format_timestamp(expires_at));
            Ok(())
        }
        Err(e) => {
            router::report_pending(redirects);
            Err(e).context("Refresh failed")
        }
    }
}

async fn watch(
    ctx: &SessionContext,
    redirects: &mut UnboundedReceiver<Redirect>,
    args: WatchArgs,
) -> Result<()> {
    ensure_backend(ctx).await?;

    match restore_session(ctx).await {
        AuthState::LoggedIn(profile) => print_profile(&profile),
        AuthState::LoggedOut => {
            router::report_pending(redirects);
            anyhow::bail!("No active session. Run `sessionkeeper login` first.");
        }
    }
    println!();
    watch_session(ctx, redirects, &args).await
}

// ============================================================================
// Helpers
// ============================================================================

async fn ensure_backend(ctx: &SessionContext) -> Result<()> {
    if ctx.api.wait_until_ready(RetryPolicy::readiness()).await {
        Ok(())
    } else {
        anyhow::bail!("Backend at {} is not responding", ctx.api.base_url())
    }
}

/// Restore the stored session. A missing profile is reported but the session
/// continues from the token's own details.
async fn restore_session(ctx: &SessionContext) -> AuthState {
    match ctx.coordinator.restore().await {
        Ok(state) => state,
        Err(SessionError::ProfileUnavailable { attempts, source }) => {
            eprintln!(
                "Profile unavailable after {} attempts ({}); using token details.",
                attempts, source
            );
            ctx.coordinator.state()
        }
        Err(e) => {
            warn!(error = %e, "Session restore failed");
            ctx.coordinator.state()
        }
    }
}

/// Count down until the session ends, the user interrupts, or a redirect
/// arrives.
async fn watch_session(
    ctx: &SessionContext,
    redirects: &mut UnboundedReceiver<Redirect>,
    args: &WatchArgs,
) -> Result<()> {
    let (tick_tx, mut ticks) = mpsc::unbounded_channel();
    let _countdown = ctx.clock.subscribe(move |remaining| {
        let _ = tick_tx.send(remaining);
    });

    if let RouteDecision::Redirect(target) = ctx.routes.mount(&Route::new(WATCH_ROUTE)) {
        router::report_pending(redirects);
        return router::finish(target);
    }

    let warning = ctx.warning();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                println!();
                info!("Interrupted, leaving session as is");
                return Ok(());
            }
            Some(redirect) = redirects.recv() => {
                return router::finish(redirect);
            }
            Some(remaining) = ticks.recv() => {
                let token = ctx.store.read();
                if let Some(WarningEvent::Show { seconds_left }) =
                    warning.observe(remaining, token.as_deref())
                {
                    println!("\nSession expires in {}.", format_minutes_left(seconds_left * 1000));
                    if args.auto_refresh {
                        match ctx.coordinator.refresh().await {
                            Ok(expires_at) => {
                                println!("Session extended until {}.", format_timestamp(expires_at));
                            }
                            Err(e) => eprintln!("Refresh failed: {}", e),
                        }
                    } else {
                        println!("Run `sessionkeeper refresh` to stay signed in.");
                        warning.dismiss();
                    }
                }
                print!("\rSession expires in {}   ", format_countdown(remaining));
                io::stdout().flush()?;
            }
        }
    }
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last_email) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}

fn print_profile(profile: &Profile) {
    println!("User:     {} ({})", profile.name, profile.role);
    if let Some(ref email) = profile.email {
        println!("Email:    {}", email);
    }
    if let Some(ref company) = profile.company_name {
        println!("Company:  {}", truncate_string(company, MAX_COMPANY_DISPLAY_LEN));
    }
}
