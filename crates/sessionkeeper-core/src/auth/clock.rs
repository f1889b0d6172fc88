//! Session expiry countdown.
//!
//! `ExpiryClock` ticks on a fixed period, evaluates how long the stored
//! token remains valid, and hands that value to every subscriber. When the
//! remaining time reaches zero it tears the session down once: the loop
//! ends, the token store is cleared, and a login redirect is emitted.
//!
//! Only one tick loop exists per clock. `start` replaces any running loop,
//! and `stop` may be called at any time, including from a subscriber.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::claims::decode_expiry;
use super::error::CredentialError;
use super::store::TokenStore;
use super::time::{SystemTimeSource, TimeSource};
use crate::navigation::{Navigator, Redirect};

/// Default tick period.
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Subscriber callback receiving remaining milliseconds.
pub type TickCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Session validity derived from the stored token and the current time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum SessionStatus {
    NoSession,
    Active { remaining_ms: i64 },
    Expired,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<(u64, TickCallback)>,
}

struct ClockInner {
    store: Arc<TokenStore>,
    navigator: Arc<Navigator>,
    time: Arc<dyn TimeSource>,
    period: Duration,
    subscribers: Mutex<Subscribers>,
    task: Mutex<Option<JoinHandle<()>>>,
    // Bumped by every start/stop; a loop whose generation is stale exits.
    generation: AtomicU64,
}

/// Handle to a running or idle countdown. Clones share the same loop.
#[derive(Clone)]
pub struct ExpiryClock {
    inner: Arc<ClockInner>,
}

/// Registration returned by [`ExpiryClock::subscribe`].
/// Dropping it unregisters the callback.
#[must_use = "dropping a Subscription unregisters the callback"]
pub struct Subscription {
    clock: Weak<ClockInner>,
    id: u64,
}

impl Subscription {
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.clock.upgrade() {
            inner.lock_subscribers().list.retain(|(id, _)| *id != self.id);
        }
    }
}

impl ExpiryClock {
    pub fn new(store: Arc<TokenStore>, navigator: Arc<Navigator>) -> Self {
        Self::with_time_source(store, navigator, Arc::new(SystemTimeSource), TICK_PERIOD)
    }

    pub fn with_time_source(
        store: Arc<TokenStore>,
        navigator: Arc<Navigator>,
        time: Arc<dyn TimeSource>,
        period: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                store,
                navigator,
                time,
                period,
                subscribers: Mutex::new(Subscribers::default()),
                task: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.time.now()
    }

    /// Milliseconds until `token` expires. Zero when absent or undecodable;
    /// negative once expired.
    pub fn remaining(&self, token: Option<&str>) -> i64 {
        self.inner.remaining(token)
    }

    /// Remaining milliseconds for the currently stored token.
    pub fn remaining_now(&self) -> i64 {
        self.inner.remaining(self.inner.store.read().as_deref())
    }

    /// Check that `token` decodes and has not yet expired.
    pub fn validate(&self, token: &str) -> Result<DateTime<Utc>, CredentialError> {
        let expires_at = decode_expiry(token)?;
        if expires_at <= self.now() {
            return Err(CredentialError::Expired(expires_at));
        }
        Ok(expires_at)
    }

    pub fn status(&self) -> SessionStatus {
        let Some(token) = self.inner.store.read() else {
            return SessionStatus::NoSession;
        };
        match decode_expiry(&token) {
            Err(_) => SessionStatus::NoSession,
            Ok(expires_at) => {
                let remaining_ms = (expires_at - self.now()).num_milliseconds();
                if remaining_ms > 0 {
                    SessionStatus::Active { remaining_ms }
                } else {
                    SessionStatus::Expired
                }
            }
        }
    }

    /// Register a tick callback. Callbacks run in registration order.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let mut subscribers = self.inner.lock_subscribers();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.list.push((id, Arc::new(callback)));
        Subscription {
            clock: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Deliver the current remaining time to subscribers outside the tick
    /// schedule. Never tears the session down.
    pub fn notify_now(&self) -> i64 {
        let remaining = self.remaining_now();
        self.inner.notify(remaining);
        remaining
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_subscribers().list.len()
    }

    /// Start ticking, replacing any loop already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.inner.lock_task();
        if let Some(previous) = task.take() {
            previous.abort();
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let period = self.inner.period;
        debug!(generation, ?period, "Expiry clock started");
        *task = Some(tokio::spawn(tick_loop(
            Arc::downgrade(&self.inner),
            period,
            generation,
        )));
    }

    /// Stop ticking. Calling on a stopped clock does nothing.
    pub fn stop(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(task) = self.inner.lock_task().take() {
            task.abort();
            debug!("Expiry clock stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .lock_task()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }
}

impl ClockInner {
    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remaining(&self, token: Option<&str>) -> i64 {
        let Some(token) = token else {
            return 0;
        };
        match decode_expiry(token) {
            Ok(expires_at) => (expires_at - self.time.now()).num_milliseconds(),
            Err(e) => {
                debug!(error = %e, "Treating undecodable token as expired");
                0
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn notify(&self, remaining: i64) {
        // Snapshot so callbacks can subscribe, unsubscribe or stop the clock.
        let callbacks: Vec<TickCallback> = self
            .lock_subscribers()
            .list
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(remaining);
        }
    }

    fn expire(&self) {
        info!("Session expired, clearing credentials");
        self.store.clear();
        self.navigator.navigate(Redirect::Login);
    }
}

async fn tick_loop(inner: Weak<ClockInner>, period: Duration, generation: u64) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(clock) = inner.upgrade() else {
            return;
        };
        if !clock.is_current(generation) {
            return;
        }

        let remaining = clock.remaining(clock.store.read().as_deref());
        clock.notify(remaining);

        if remaining <= 0 {
            // A subscriber may have stopped or restarted the clock.
            if clock.is_current(generation) {
                clock.generation.fetch_add(1, Ordering::SeqCst);
                clock.expire();
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::test_tokens::{token_expiring_at, token_with_claims};
    use crate::auth::store::DurabilityTier;
    use crate::auth::time::AnchoredTimeSource;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::sleep;

    struct Fixture {
        clock: ExpiryClock,
        store: Arc<TokenStore>,
        nav_rx: UnboundedReceiver<Redirect>,
        time: AnchoredTimeSource,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(TokenStore::in_memory());
        let (navigator, nav_rx) = Navigator::new("/dashboard");
        // Whole-second anchor keeps the arithmetic exact against `exp` seconds.
        let anchor = DateTime::from_timestamp(Utc::now().timestamp(), 0).unwrap();
        let time = AnchoredTimeSource::starting_at(anchor);
        let clock = ExpiryClock::with_time_source(
            Arc::clone(&store),
            Arc::new(navigator),
            Arc::new(time),
            TICK_PERIOD,
        );
        Fixture {
            clock,
            store,
            nav_rx,
            time,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Redirect>) -> Vec<Redirect> {
        let mut out = Vec::new();
        while let Ok(r) = rx.try_recv() {
            out.push(r);
        }
        out
    }

    fn recorder(clock: &ExpiryClock) -> (Arc<Mutex<Vec<i64>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let sub = clock.subscribe(move |ms| sink.lock().unwrap().push(ms));
        (seen, sub)
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_without_token_is_zero() {
        let f = fixture();
        assert_eq!(f.clock.remaining(None), 0);
        assert_eq!(f.clock.remaining(Some("garbage")), 0);
        assert_eq!(f.clock.remaining_now(), 0);
        assert_eq!(f.clock.status(), SessionStatus::NoSession);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_for_past_and_future_tokens() {
        let f = fixture();
        let past = token_expiring_at(f.time.now() - ChronoDuration::seconds(30));
        let future = token_expiring_at(f.time.now() + ChronoDuration::seconds(90));

        assert_eq!(f.clock.remaining(Some(&past)), -30_000);
        assert_eq!(f.clock.remaining(Some(&future)), 90_000);
        assert!(matches!(f.clock.validate(&past), Err(CredentialError::Expired(_))));
        assert!(f.clock.validate(&future).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_exp_counts_as_expired() {
        let f = fixture();
        let token = token_with_claims(json!({"user_id": 1}));
        assert_eq!(f.clock.remaining(Some(&token)), 0);
        assert!(matches!(f.clock.validate(&token), Err(CredentialError::Malformed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_tracks_store() {
        let f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() + ChronoDuration::seconds(5)),
            DurabilityTier::Ephemeral,
        );
        assert_eq!(f.clock.status(), SessionStatus::Active { remaining_ms: 5000 });

        f.store.save(
            &token_expiring_at(f.time.now() - ChronoDuration::seconds(5)),
            DurabilityTier::Ephemeral,
        );
        assert_eq!(f.clock.status(), SessionStatus::Expired);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_tears_down_within_one_tick_once() {
        let mut f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() - ChronoDuration::seconds(10)),
            DurabilityTier::Persistent,
        );
        let (seen, _sub) = recorder(&f.clock);

        f.clock.start();
        sleep(Duration::from_millis(1001)).await;

        assert_eq!(f.store.read(), None);
        assert_eq!(drain(&mut f.nav_rx), vec![Redirect::Login]);
        assert!(!f.clock.is_running());

        sleep(Duration::from_secs(5)).await;
        assert!(drain(&mut f.nav_rx).is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_strictly_decreases() {
        let f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() + ChronoDuration::seconds(10)),
            DurabilityTier::Persistent,
        );
        let (seen, _sub) = recorder(&f.clock);

        f.clock.start();
        sleep(Duration::from_millis(3500)).await;

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![9000, 8000, 7000]);
        assert!(10_000 - seen[0] <= TICK_PERIOD.as_millis() as i64);
        assert!(seen.windows(2).all(|w| w[1] < w[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_single_loop() {
        let mut f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() + ChronoDuration::minutes(10)),
            DurabilityTier::Persistent,
        );
        let (seen, _sub) = recorder(&f.clock);

        f.clock.start();
        f.clock.start();
        sleep(Duration::from_millis(3500)).await;

        assert_eq!(seen.lock().unwrap().len(), 3);
        assert!(f.clock.is_running());
        assert!(drain(&mut f.nav_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_start_expires_once() {
        let mut f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() + ChronoDuration::seconds(2)),
            DurabilityTier::Ephemeral,
        );

        f.clock.start();
        f.clock.start();
        sleep(Duration::from_secs(4)).await;

        assert_eq!(drain(&mut f.nav_rx), vec![Redirect::Login]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let f = fixture();
        f.clock.stop();
        f.clock.start();
        assert!(f.clock.is_running());
        f.clock.stop();
        f.clock.stop();
        assert!(!f.clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_from_inside_callback() {
        let mut f = fixture();
        // Token already expired: the callback stops the clock before teardown.
        f.store.save(
            &token_expiring_at(f.time.now() - ChronoDuration::seconds(1)),
            DurabilityTier::Persistent,
        );
        let clock = f.clock.clone();
        let _sub = f.clock.subscribe(move |_| clock.stop());

        f.clock.start();
        sleep(Duration::from_secs(3)).await;

        assert!(!f.clock.is_running());
        assert!(f.store.read().is_some());
        assert!(drain(&mut f.nav_rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_in_registration_order_and_unsubscribe() {
        let f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() + ChronoDuration::minutes(1)),
            DurabilityTier::Persistent,
        );
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = {
            let order = Arc::clone(&order);
            f.clock.subscribe(move |_| order.lock().unwrap().push("a"))
        };
        let _b = {
            let order = Arc::clone(&order);
            f.clock.subscribe(move |_| order.lock().unwrap().push("b"))
        };
        assert_eq!(f.clock.subscriber_count(), 2);

        f.clock.start();
        sleep(Duration::from_millis(1500)).await;
        a.cancel();
        assert_eq!(f.clock.subscriber_count(), 1);
        sleep(Duration::from_secs(1)).await;

        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_store_expires_on_next_tick() {
        let mut f = fixture();
        f.store.save(
            &token_expiring_at(f.time.now() + ChronoDuration::hours(1)),
            DurabilityTier::Persistent,
        );
        f.clock.start();
        sleep(Duration::from_millis(1500)).await;
        assert!(drain(&mut f.nav_rx).is_empty());

        // Another process signing out removes the token underneath us.
        f.store.clear();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(drain(&mut f.nav_rx), vec![Redirect::Login]);
    }
}
