//! Session lifecycle: login, logout, refresh and cold-boot restoration.
//!
//! `SessionCoordinator` owns the authoritative [`AuthState`] and publishes it
//! through a `watch` channel, so observers only ever see committed states.
//! It drives the [`ExpiryClock`] and reacts to the clock's own forced expiry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::claims::decode_claims;
use super::clock::{ExpiryClock, Subscription};
use super::error::SessionError;
use super::store::{DurabilityTier, TokenStore};
use crate::api::{retry, ApiError, RetryPolicy, SessionBackend};
use crate::models::Profile;
use crate::navigation::{Navigator, Redirect};

/// Profile fetch attempts during restoration.
const PROFILE_RETRY_ATTEMPTS: u32 = 5;

/// Fixed delay between profile fetch attempts.
const PROFILE_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// Where a signed-in user lands when coming from the login page.
pub const DEFAULT_HOME_PATH: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn(Profile),
}

impl AuthState {
    pub fn is_logged_in(&self) -> bool {
        matches!(self, AuthState::LoggedIn(_))
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            AuthState::LoggedIn(profile) => Some(profile),
            AuthState::LoggedOut => None,
        }
    }
}

pub struct SessionCoordinator {
    backend: Arc<dyn SessionBackend>,
    store: Arc<TokenStore>,
    clock: ExpiryClock,
    navigator: Arc<Navigator>,
    state: Arc<watch::Sender<AuthState>>,
    profile_retry: RetryPolicy,
    home_path: String,
    _expiry_watch: Subscription,
}

impl SessionCoordinator {
    pub fn new(
        backend: Arc<dyn SessionBackend>,
        store: Arc<TokenStore>,
        clock: ExpiryClock,
        navigator: Arc<Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::LoggedOut);
        let state = Arc::new(state);

        // The clock tears the session down on its own; mirror that here.
        let observed = Arc::clone(&state);
        let expiry_watch = clock.subscribe(move |remaining| {
            if remaining <= 0 {
                mark_logged_out(&observed);
            }
        });

        Self {
            backend,
            store,
            clock,
            navigator,
            state,
            profile_retry: RetryPolicy::fixed(PROFILE_RETRY_ATTEMPTS, PROFILE_RETRY_DELAY),
            home_path: DEFAULT_HOME_PATH.to_string(),
            _expiry_watch: expiry_watch,
        }
    }

    pub fn with_profile_retry(mut self, policy: RetryPolicy) -> Self {
        self.profile_retry = policy;
        self
    }

    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    pub fn clock(&self) -> &ExpiryClock {
        &self.clock
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile().cloned()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.borrow().is_logged_in()
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Install `token` as the live session.
    ///
    /// A token that does not decode, or is already expired, is rejected
    /// before anything is stored.
    pub fn login(&self, token: &str, tier: DurabilityTier) -> Result<Profile, SessionError> {
        let claims = decode_claims(token)?;
        self.clock.validate(token)?;

        let profile = claims.to_profile();
        self.store.save(token, tier);
        self.state.send_replace(AuthState::LoggedIn(profile.clone()));
        self.leave_login_page();
        self.clock.start();

        info!(user_id = ?profile.id, role = %profile.role, ?tier, "Logged in");
        Ok(profile)
    }

    /// Exchange credentials for a token and log in with it.
    ///
    /// A rejection here is a bad password, not an expired session, and is
    /// returned to the caller as [`SessionError::LoginRejected`].
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Profile, SessionError> {
        let token = self
            .backend
            .login(email, password, remember)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized | ApiError::AccessDenied(_) => SessionError::LoginRejected(e),
                other => SessionError::from(other),
            })?;

        self.login(&token, DurabilityTier::from_remember(remember))
    }

    /// End the session. Safe to call repeatedly and after a forced expiry.
    pub fn logout(&self) {
        self.store.clear();
        self.clock.stop();
        mark_logged_out(&self.state);
        self.navigator.navigate(Redirect::Login);
        info!("Logged out");
    }

    /// Extend the session with a fresh token from the backend.
    ///
    /// The new token is stored in the same tier as the old one and the
    /// countdown restarts. Any failure ends the session. If the session
    /// ended or changed while the request was in flight, the answer is
    /// dropped and `NoSession` returned.
    pub async fn refresh(&self) -> Result<DateTime<Utc>, SessionError> {
        if !self.is_logged_in() {
            return Err(SessionError::NoSession);
        }
        let (Some(tier), Some(current)) = (self.store.tier(), self.store.read()) else {
            self.logout();
            return Err(SessionError::NoSession);
        };

        let answer = self.backend.refresh().await;
        if !self.is_logged_in() {
            debug!("Session ended during refresh, discarding response");
            return Err(SessionError::NoSession);
        }

        let token = match answer {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to refresh session");
                self.logout();
                return Err(SessionError::RefreshFailed(e));
            }
        };

        let expires_at = match self.clock.validate(&token) {
            Ok(expires_at) => expires_at,
            Err(e) => {
                warn!(error = %e, "Refresh returned an unusable token");
                self.logout();
                return Err(SessionError::RefreshFailed(ApiError::InvalidResponse(e.to_string())));
            }
        };

        if !self.is_current(&current, tier) {
            debug!("Session replaced during refresh, discarding response");
            return Err(SessionError::NoSession);
        }
        self.store.save(&token, tier);
        self.leave_login_page();
        self.clock.stop();
        self.clock.start();
        self.clock.notify_now();

        info!(%expires_at, "Session extended");
        Ok(expires_at)
    }

    /// Restore the session from storage on process start.
    ///
    /// An absent, malformed or expired token ends in `LoggedOut` without a
    /// backend call. A valid one is enriched with the backend profile, then
    /// published, then the countdown starts.
    pub async fn restore(&self) -> Result<AuthState, SessionError> {
        let Some(token) = self.store.read() else {
            debug!("No stored session");
            return Ok(self.discard());
        };

        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "Discarding stored credential");
                return Ok(self.discard());
            }
        };
        if let Err(e) = self.clock.validate(&token) {
            info!(error = %e, "Stored session no longer valid");
            return Ok(self.discard());
        }

        let mut profile = claims.to_profile();
        let fetched = retry(
            self.profile_retry,
            |e: &ApiError| e.is_transient(),
            |attempt| {
                debug!(attempt, "Fetching profile");
                self.backend.fetch_profile()
            },
        )
        .await;

        match fetched {
            Ok(remote) => {
                profile.merge_remote(&remote);
                Ok(self.resume(profile))
            }
            Err((_, e)) if self.store.read().is_none() => {
                // The request guard already signed us out.
                warn!(error = %e, "Stored session rejected by server");
                self.clock.stop();
                mark_logged_out(&self.state);
                Err(SessionError::from(e))
            }
            Err((attempts, e)) if e.is_transient() => {
                warn!(attempts, error = %e, "Profile unavailable, continuing with token claims");
                self.resume(profile);
                Err(SessionError::ProfileUnavailable { attempts, source: e })
            }
            Err((_, e)) => {
                // 402/403 leave the token in place; the guard has redirected.
                warn!(error = %e, "Profile request refused, continuing with token claims");
                self.resume(profile);
                Err(SessionError::from(e))
            }
        }
    }

    /// Whether the session captured before an await is still the live one.
    fn is_current(&self, token: &str, tier: DurabilityTier) -> bool {
        self.is_logged_in()
            && self.store.tier() == Some(tier)
            && self.store.read().as_deref() == Some(token)
    }

    /// Move off the login page so the next forced expiry redirects again.
    fn leave_login_page(&self) {
        if self.navigator.is_at(Redirect::Login) {
            self.navigator.set_location(self.home_path.clone());
        }
    }

    fn resume(&self, profile: Profile) -> AuthState {
        let state = AuthState::LoggedIn(profile);
        self.state.send_replace(state.clone());
        self.leave_login_page();
        self.clock.start();
        info!("Session restored");
        state
    }

    fn discard(&self) -> AuthState {
        self.store.clear();
        self.clock.stop();
        mark_logged_out(&self.state);
        AuthState::LoggedOut
    }
}

fn mark_logged_out(state: &watch::Sender<AuthState>) {
    state.send_if_modified(|current| {
        if current.is_logged_in() {
            *current = AuthState::LoggedOut;
            true
        } else {
            false
        }
    });
}
