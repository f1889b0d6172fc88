//! API client for the billing backend's auth and profile endpoints.
//!
//! Every exchange goes through the [`RequestGuard`]: the stored token is
//! attached on the way out, and 401/402/403 responses trigger the guard's
//! redirect handling on the way back before the error reaches the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::backend::SessionBackend;
use super::guard::{RequestGuard, LOGIN_PATH};
use super::retry::{retry, RetryPolicy};
use super::ApiError;
use crate::models::{LoginRequest, RemoteProfile, TokenResponse};

// ============================================================================
// Constants
// ============================================================================

const REFRESH_PATH: &str = "/auth/refresh";
const PROFILE_PATH: &str = "/profile/";
const HEALTH_PATH: &str = "/health";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Health checks give up quickly; a starting backend is retried instead.
const HEALTH_TIMEOUT_SECS: u64 = 2;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    guard: RequestGuard,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, guard: RequestGuard) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, guard, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, guard: RequestGuard, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            guard,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Check the response status, letting the guard react to failures.
    async fn check_response(&self, path: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let outcome = self.guard.inspect(path, status);
        debug!(path, %status, ?outcome, "Request failed");
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, &body))
    }

    async fn send<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = self.guard.authorize(self.client.request(method.clone(), &url));
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            let response = self.check_response(path, response).await?;
            return response
                .json()
                .await
                .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)));
        }
    }

    /// Single health check.
    pub async fn health(&self) -> bool {
        let result = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await;
        matches!(result, Ok(ref r) if r.status().is_success())
    }

    /// Poll `/health` until the backend answers or the policy gives up.
    pub async fn wait_until_ready(&self, policy: RetryPolicy) -> bool {
        let result = retry(
            policy,
            |_: &&str| true,
            |attempt| async move {
                debug!(attempt, max = policy.max_attempts, "Checking backend");
                if self.health().await {
                    Ok(())
                } else {
                    Err("backend not ready")
                }
            },
        )
        .await;

        match result {
            Ok(()) => {
                info!("Backend ready");
                true
            }
            Err((attempts, _)) => {
                warn!(attempts, "Backend startup timeout");
                false
            }
        }
    }
}

#[async_trait]
impl SessionBackend for ApiClient {
    async fn login(&self, email: &str, password: &str, remember: bool) -> Result<String, ApiError> {
        let body = LoginRequest {
            email,
            password,
            remember,
        };
        let response: TokenResponse = self.send(Method::POST, LOGIN_PATH, Some(&body)).await?;
        Ok(response.access_token)
    }

    async fn refresh(&self) -> Result<String, ApiError> {
        let response: TokenResponse = self
            .send::<_, ()>(Method::POST, REFRESH_PATH, None)
            .await?;
        Ok(response.access_token)
    }

    async fn fetch_profile(&self) -> Result<RemoteProfile, ApiError> {
        self.send::<_, ()>(Method::GET, PROFILE_PATH, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenStore;
    use crate::navigation::Navigator;
    use std::sync::Arc;

    fn client(base: &str) -> ApiClient {
        let (navigator, _rx) = Navigator::new("/");
        let guard = RequestGuard::new(Arc::new(TokenStore::in_memory()), Arc::new(navigator));
        ApiClient::new(base, guard).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let api = client("http://localhost:8000/");
        assert_eq!(api.base_url(), "http://localhost:8000");
        assert_eq!(api.url(PROFILE_PATH), "http://localhost:8000/profile/");
        assert_eq!(api.url(LOGIN_PATH), "http://localhost:8000/auth/login");
    }

    #[tokio::test]
    async fn test_health_false_when_unreachable() {
        // Bind an ephemeral port and release it so nothing is listening there.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let api = client(&format!("http://127.0.0.1:{}", port));
        assert!(!api.health().await);
    }
}
