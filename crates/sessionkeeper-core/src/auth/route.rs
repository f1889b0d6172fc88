//! Per-navigation access checks for protected views.

use std::sync::Arc;

use tracing::debug;

use super::claims::decode_claims;
use super::clock::ExpiryClock;
use super::store::TokenStore;
use crate::models::Role;
use crate::navigation::{Navigator, Redirect};

/// A protected view, optionally restricted to some roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: String,
    pub allowed_roles: Option<Vec<Role>>,
}

impl Route {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            allowed_roles: None,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.allowed_roles = Some(roles.into_iter().collect());
        self
    }

    fn admits(&self, role: &Role) -> bool {
        match &self.allowed_roles {
            Some(roles) => roles.contains(role),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Render,
    Redirect(Redirect),
}

#[derive(Clone)]
pub struct RouteGuard {
    store: Arc<TokenStore>,
    clock: ExpiryClock,
    navigator: Arc<Navigator>,
}

impl RouteGuard {
    pub fn new(store: Arc<TokenStore>, clock: ExpiryClock, navigator: Arc<Navigator>) -> Self {
        Self {
            store,
            clock,
            navigator,
        }
    }

    /// Decide whether `route` may render. Storage is read on every call.
    pub fn check(&self, route: &Route) -> RouteDecision {
        let Some(token) = self.store.read() else {
            return RouteDecision::Redirect(Redirect::Login);
        };
        if route.allowed_roles.is_none() {
            return RouteDecision::Render;
        }

        match decode_claims(&token) {
            Ok(claims) => {
                let role = claims.role.as_deref().map(Role::from).unwrap_or(Role::User);
                if route.admits(&role) {
                    RouteDecision::Render
                } else {
                    debug!(path = %route.path, %role, "Role not permitted");
                    RouteDecision::Redirect(Redirect::Unauthorized)
                }
            }
            Err(_) => RouteDecision::Redirect(Redirect::Login),
        }
    }

    /// Enter `route`: render it and arm the countdown, or redirect.
    pub fn mount(&self, route: &Route) -> RouteDecision {
        let decision = self.check(route);
        match decision {
            RouteDecision::Render => {
                self.navigator.set_location(route.path.clone());
                self.clock.start();
            }
            RouteDecision::Redirect(target) => {
                self.navigator.navigate(target);
            }
        }
        decision
    }
}
