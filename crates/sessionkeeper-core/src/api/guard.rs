//! Credential attachment and auth-status interpretation for every exchange.
//!
//! Outbound, the stored token is attached as a bearer header. Inbound, a
//! failed status maps to exactly one [`GuardOutcome`]; applying it performs
//! the matching side effect (clear + login redirect, unauthorized redirect,
//! billing redirect, or nothing).

use std::sync::Arc;

use reqwest::{RequestBuilder, StatusCode};
use tracing::{info, warn};

use crate::auth::TokenStore;
use crate::navigation::{Navigator, Redirect};

/// Path of the login endpoint; failures there are never session expiry.
pub const LOGIN_PATH: &str = "/auth/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Propagate,
    RedirectToLogin,
    RedirectToUnauthorized,
    RedirectToSubscriptionExpired,
}

impl GuardOutcome {
    /// Map a response status to its outcome. Pure; no side effects.
    pub fn classify(status: StatusCode, is_login_request: bool) -> Self {
        match status.as_u16() {
            401 if !is_login_request => GuardOutcome::RedirectToLogin,
            402 => GuardOutcome::RedirectToSubscriptionExpired,
            403 if !is_login_request => GuardOutcome::RedirectToUnauthorized,
            _ => GuardOutcome::Propagate,
        }
    }
}

#[derive(Clone)]
pub struct RequestGuard {
    store: Arc<TokenStore>,
    navigator: Arc<Navigator>,
}

impl RequestGuard {
    pub fn new(store: Arc<TokenStore>, navigator: Arc<Navigator>) -> Self {
        Self { store, navigator }
    }

    pub fn is_login_path(path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        path.trim_end_matches('/').ends_with(LOGIN_PATH)
    }

    /// Outbound hook: attach the stored token when there is one.
    pub fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.read() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Inbound hook for a non-success response to `path`.
    pub fn inspect(&self, path: &str, status: StatusCode) -> GuardOutcome {
        let outcome = GuardOutcome::classify(status, Self::is_login_path(path));
        self.apply(outcome, path);
        outcome
    }

    fn apply(&self, outcome: GuardOutcome, path: &str) {
        match outcome {
            GuardOutcome::Propagate => {}
            GuardOutcome::RedirectToLogin => {
                info!(path, "Credential rejected, signing out");
                self.store.clear();
                self.navigator.navigate(Redirect::Login);
            }
            GuardOutcome::RedirectToUnauthorized => {
                warn!(path, "Access denied");
                self.navigator.navigate(Redirect::Unauthorized);
            }
            GuardOutcome::RedirectToSubscriptionExpired => {
                warn!(path, "Subscription lapsed");
                self.navigator.navigate(Redirect::SubscriptionExpired);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::DurabilityTier;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn guard_at(location: &str) -> (RequestGuard, Arc<TokenStore>, UnboundedReceiver<Redirect>) {
        let store = Arc::new(TokenStore::in_memory());
        store.save("live-token", DurabilityTier::Persistent);
        let (navigator, rx) = Navigator::new(location);
        (RequestGuard::new(Arc::clone(&store), Arc::new(navigator)), store, rx)
    }

    #[test]
    fn test_classify() {
        use GuardOutcome::*;
        assert_eq!(GuardOutcome::classify(StatusCode::UNAUTHORIZED, false), RedirectToLogin);
        assert_eq!(GuardOutcome::classify(StatusCode::UNAUTHORIZED, true), Propagate);
        assert_eq!(GuardOutcome::classify(StatusCode::PAYMENT_REQUIRED, false), RedirectToSubscriptionExpired);
        assert_eq!(GuardOutcome::classify(StatusCode::FORBIDDEN, false), RedirectToUnauthorized);
        assert_eq!(GuardOutcome::classify(StatusCode::FORBIDDEN, true), Propagate);
        assert_eq!(GuardOutcome::classify(StatusCode::NOT_FOUND, false), Propagate);
        assert_eq!(GuardOutcome::classify(StatusCode::INTERNAL_SERVER_ERROR, false), Propagate);
    }

    #[test]
    fn test_login_path_detection() {
        assert!(RequestGuard::is_login_path("/auth/login"));
        assert!(RequestGuard::is_login_path("http://localhost:8000/auth/login/"));
        assert!(RequestGuard::is_login_path("/api/auth/login?next=/"));
        assert!(!RequestGuard::is_login_path("/auth/refresh"));
        assert!(!RequestGuard::is_login_path("/auth/login-history"));
    }

    #[test]
    fn test_401_on_login_request_is_untouched() {
        let (guard, store, mut rx) = guard_at("/login");
        assert_eq!(guard.inspect("/auth/login", StatusCode::UNAUTHORIZED), GuardOutcome::Propagate);
        assert!(store.read().is_some());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_401_elsewhere_clears_and_redirects() {
        let (guard, store, mut rx) = guard_at("/invoices");
        assert_eq!(guard.inspect("/invoices/12", StatusCode::UNAUTHORIZED), GuardOutcome::RedirectToLogin);
        assert_eq!(store.read(), None);
        assert_eq!(rx.try_recv().unwrap(), Redirect::Login);
    }

    #[test]
    fn test_401_while_on_login_page_does_not_loop() {
        let (guard, store, mut rx) = guard_at("/login");
        guard.inspect("/profile/", StatusCode::UNAUTHORIZED);
        assert_eq!(store.read(), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_402_and_403_keep_token() {
        let (guard, store, mut rx) = guard_at("/reports");
        guard.inspect("/reports/gst", StatusCode::PAYMENT_REQUIRED);
        assert_eq!(rx.try_recv().unwrap(), Redirect::SubscriptionExpired);

        guard.inspect("/roles", StatusCode::FORBIDDEN);
        assert_eq!(rx.try_recv().unwrap(), Redirect::Unauthorized);

        assert_eq!(store.read().as_deref(), Some("live-token"));
    }

    #[test]
    fn test_authorize_attaches_bearer() {
        let (guard, store, _rx) = guard_at("/");
        let client = reqwest::Client::new();

        let request = guard.authorize(client.get("http://localhost/profile/")).build().unwrap();
        assert_eq!(
            request.headers().get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer live-token"
        );

        store.clear();
        let request = guard.authorize(client.get("http://localhost/health")).build().unwrap();
        assert!(request.headers().get(reqwest::header::AUTHORIZATION).is_none());
    }
}
