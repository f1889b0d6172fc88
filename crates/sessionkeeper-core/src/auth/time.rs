use chrono::{DateTime, Duration, Utc};
use tokio::time::Instant;

/// Wall-clock source used for expiry arithmetic.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall clock anchored at creation and advanced by tokio's monotonic clock.
///
/// Under a paused tokio runtime this follows `tokio::time::advance`, which
/// lets tick-driven behavior be exercised without real waiting.
#[derive(Debug, Clone, Copy)]
pub struct AnchoredTimeSource {
    wall: DateTime<Utc>,
    mono: Instant,
}

impl AnchoredTimeSource {
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            wall,
            mono: Instant::now(),
        }
    }
}

impl TimeSource for AnchoredTimeSource {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = Duration::from_std(self.mono.elapsed()).unwrap_or_else(|_| Duration::zero());
        self.wall + elapsed
    }
}
