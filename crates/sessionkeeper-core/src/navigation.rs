//! Hard-navigation signals.
//!
//! Low-level modules never redirect on their own. They call
//! [`Navigator::navigate`], which records the new location and emits a
//! [`Redirect`] on a channel consumed by a single top-level router adapter.
//! Navigating to the page the user is already on is a no-op, so a forced
//! expiry and an explicit logout racing in the same tick produce one redirect.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fixed redirect destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Redirect {
    Login,
    Unauthorized,
    SubscriptionExpired,
}

impl Redirect {
    pub fn path(&self) -> &'static str {
        match self {
            Redirect::Login => "/login",
            Redirect::Unauthorized => "/unauthorized",
            Redirect::SubscriptionExpired => "/subscription-expired",
        }
    }
}

impl std::fmt::Display for Redirect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

pub struct Navigator {
    location: Mutex<String>,
    tx: mpsc::UnboundedSender<Redirect>,
}

impl Navigator {
    /// Create a navigator positioned at `initial`, returning the receiving
    /// end for the router adapter.
    pub fn new(initial: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Redirect>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let navigator = Self {
            location: Mutex::new(initial.into()),
            tx,
        };
        (navigator, rx)
    }

    /// Current location path.
    pub fn location(&self) -> String {
        self.lock().clone()
    }

    pub fn is_at(&self, target: Redirect) -> bool {
        self.lock().as_str() == target.path()
    }

    /// Record an in-app route transition performed by the router itself.
    pub fn set_location(&self, path: impl Into<String>) {
        *self.lock() = path.into();
    }

    /// Hard-navigate to `target` unless already there.
    /// Returns whether a redirect was emitted.
    pub fn navigate(&self, target: Redirect) -> bool {
        {
            let mut location = self.lock();
            if location.as_str() == target.path() {
                debug!(target = %target, "Already at redirect target, skipping");
                return false;
            }
            *location = target.path().to_string();
        }

        debug!(target = %target, "Hard navigation");
        if self.tx.send(target).is_err() {
            warn!(target = %target, "Router adapter gone, redirect dropped");
        }
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        // A poisoned lock only means a panic elsewhere; the path is still usable.
        self.location.lock().unwrap_or_else(|e| e.into_inner())
    }
}
