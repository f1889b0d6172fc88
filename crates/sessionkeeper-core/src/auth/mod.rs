//! Authentication: credential storage, expiry tracking and session lifecycle.
//!
//! - `TokenStore`: two-tier credential storage (ephemeral or persistent)
//! - `ExpiryClock`: periodic countdown that tears the session down at expiry
//! - `SessionCoordinator`: login, logout, refresh and cold-boot restoration
//! - `RouteGuard`: per-navigation access checks
//! - `ExpiryWarning`: the one-shot "session expiring soon" notice

pub mod claims;
pub mod clock;
pub mod credentials;
pub mod error;
pub mod route;
pub mod session;
pub mod store;
pub mod time;
pub mod warning;

pub use claims::{decode_claims, decode_expiry, Claims};
pub use clock::{ExpiryClock, SessionStatus, Subscription, TickCallback, TICK_PERIOD};
pub use credentials::{FileSlot, KeyringSlot, MemorySlot, TokenSlot};
pub use error::{CredentialError, SessionError};
pub use route::{Route, RouteDecision, RouteGuard};
pub use session::{AuthState, SessionCoordinator};
pub use store::{DurabilityTier, TokenStore};
pub use time::{AnchoredTimeSource, SystemTimeSource, TimeSource};
pub use warning::{ExpiryWarning, WarningEvent, DEFAULT_WARNING_BEFORE};
