//! REST client module for the billing backend.
//!
//! This module provides the `ApiClient` used for login, session refresh,
//! profile lookup and health probing, and the `RequestGuard` that every
//! exchange passes through.
//!
//! The backend uses JWT bearer token authentication obtained from
//! `POST /auth/login`.

pub mod backend;
pub mod client;
pub mod error;
pub mod guard;
pub mod retry;

pub use backend::SessionBackend;
pub use client::ApiClient;
pub use error::ApiError;
pub use guard::{GuardOutcome, RequestGuard, LOGIN_PATH};
pub use retry::{retry, RetryPolicy};
