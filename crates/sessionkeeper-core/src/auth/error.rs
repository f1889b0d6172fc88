use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::ApiError;

/// Why a stored credential cannot be trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Malformed credential: {0}")]
    Malformed(String),

    #[error("Credential expired at {0}")]
    Expired(DateTime<Utc>),
}

/// Errors surfaced by the session coordinator.
///
/// Everything here is handled at the coordinator boundary: either the
/// session is torn down and a redirect emitted, or the error is returned
/// to the immediate caller (the login form).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Invalid email or password")]
    LoginRejected(#[source] ApiError),

    #[error("Session rejected by server")]
    AuthRejected,

    #[error("Access denied")]
    AccessDenied,

    #[error("Subscription expired")]
    BillingLapsed,

    #[error("Failed to extend session: {0}")]
    RefreshFailed(#[source] ApiError),

    #[error("No active session")]
    NoSession,

    #[error("Profile unavailable after {attempts} attempts: {source}")]
    ProfileUnavailable {
        attempts: u32,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for SessionError {
    /// Map guard-level statuses onto the session taxonomy.
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => SessionError::AuthRejected,
            ApiError::AccessDenied(_) => SessionError::AccessDenied,
            ApiError::PaymentRequired => SessionError::BillingLapsed,
            other => SessionError::Api(other),
        }
    }
}
