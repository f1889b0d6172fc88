use async_trait::async_trait;

use super::ApiError;
use crate::models::RemoteProfile;

/// Remote operations the session coordinator depends on.
///
/// [`ApiClient`](super::ApiClient) is the HTTP implementation; tests supply
/// scripted ones.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Exchange credentials for a token.
    async fn login(&self, email: &str, password: &str, remember: bool) -> Result<String, ApiError>;

    /// Exchange the currently stored token for one with a later expiry.
    async fn refresh(&self) -> Result<String, ApiError>;

    /// Authoritative profile for the currently stored token.
    async fn fetch_profile(&self) -> Result<RemoteProfile, ApiError>;
}
