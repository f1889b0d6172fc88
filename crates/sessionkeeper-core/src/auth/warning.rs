//! "Session expiring soon" notice.
//!
//! Fed from clock ticks. Shows once per token when the remaining time drops
//! under the threshold; a dismissal holds until the token changes.

use std::sync::Mutex;
use std::time::Duration;

/// Default lead time before expiry.
pub const DEFAULT_WARNING_BEFORE: Duration = Duration::from_secs(6 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningEvent {
    /// Show the notice with the seconds left.
    Show { seconds_left: i64 },
}

#[derive(Debug, Default)]
struct WarningState {
    token: Option<String>,
    warned: bool,
    dismissed: bool,
}

#[derive(Debug)]
pub struct ExpiryWarning {
    threshold_ms: i64,
    state: Mutex<WarningState>,
}

impl ExpiryWarning {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold_ms: i64::try_from(threshold.as_millis()).unwrap_or(i64::MAX),
            state: Mutex::new(WarningState::default()),
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms.max(0) as u64)
    }

    /// Evaluate one tick against the currently stored token.
    pub fn observe(&self, remaining_ms: i64, token: Option<&str>) -> Option<WarningEvent> {
        let mut state = self.lock();

        if state.token.as_deref() != token {
            state.token = token.map(str::to_string);
            state.warned = false;
            state.dismissed = false;
        }

        if remaining_ms <= 0 || remaining_ms > self.threshold_ms {
            return None;
        }
        if state.warned || state.dismissed {
            return None;
        }

        state.warned = true;
        Some(WarningEvent::Show {
            seconds_left: remaining_ms / 1000,
        })
    }

    /// Suppress the notice until the token changes.
    pub fn dismiss(&self) {
        self.lock().dismissed = true;
    }

    pub fn is_dismissed(&self) -> bool {
        self.lock().dismissed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WarningState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ExpiryWarning {
    fn default() -> Self {
        Self::new(DEFAULT_WARNING_BEFORE)
    }
}
