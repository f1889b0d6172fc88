//! Client-side session management for a token-authenticated backend.
//!
//! A bearer token is stored in one of two durability tiers, decoded for its
//! expiry, and watched by a periodic countdown that signs the user out the
//! moment it lapses. Outgoing requests carry the token, and 401/402/403
//! responses are turned into redirects. Cold starts restore the session from
//! storage and enrich it with the backend's profile.
//!
//! Low-level modules never navigate directly; they emit a
//! [`navigation::Redirect`] through the [`navigation::Navigator`] and the
//! embedding application decides how to act on it.

pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod models;
pub mod navigation;
pub mod utils;

pub use api::{ApiClient, ApiError, RequestGuard};
pub use auth::{
    AuthState, DurabilityTier, ExpiryClock, ExpiryWarning, RouteGuard, SessionCoordinator,
    SessionError, SessionStatus, TokenStore,
};
pub use config::Config;
pub use context::SessionContext;
pub use navigation::{Navigator, Redirect};
