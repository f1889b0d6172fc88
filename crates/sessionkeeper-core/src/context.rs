//! Wiring of the session components from a [`Config`].

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::api::{ApiClient, RequestGuard, RetryPolicy, SessionBackend};
use crate::auth::{
    ExpiryClock, ExpiryWarning, RouteGuard, SessionCoordinator, SystemTimeSource, TokenStore,
};
use crate::config::Config;
use crate::navigation::{Navigator, Redirect};

/// Every session component, sharing one store, navigator and clock.
pub struct SessionContext {
    pub config: Config,
    pub store: Arc<TokenStore>,
    pub navigator: Arc<Navigator>,
    pub clock: ExpiryClock,
    pub api: ApiClient,
    pub coordinator: SessionCoordinator,
    pub routes: RouteGuard,
}

impl SessionContext {
    /// Build the components, with the persistent tier chosen by `config`.
    /// The receiver yields redirects for the embedding application.
    pub fn from_config(config: Config) -> Result<(Self, UnboundedReceiver<Redirect>)> {
        let store = Arc::new(TokenStore::from_config(&config)?);
        Self::with_store(config, store)
    }

    pub fn with_store(
        config: Config,
        store: Arc<TokenStore>,
    ) -> Result<(Self, UnboundedReceiver<Redirect>)> {
        let (navigator, redirects) = Navigator::new("/");
        let navigator = Arc::new(navigator);

        let clock = ExpiryClock::with_time_source(
            Arc::clone(&store),
            Arc::clone(&navigator),
            Arc::new(SystemTimeSource),
            config.tick_interval(),
        );

        let guard = RequestGuard::new(Arc::clone(&store), Arc::clone(&navigator));
        let api = ApiClient::with_timeout(&config.api_base_url, guard, config.request_timeout())?;
        debug!(base_url = api.base_url(), "API client configured");

        let backend: Arc<dyn SessionBackend> = Arc::new(api.clone());
        let coordinator = SessionCoordinator::new(
            backend,
            Arc::clone(&store),
            clock.clone(),
            Arc::clone(&navigator),
        )
        .with_profile_retry(RetryPolicy::fixed(
            config.profile_retry_attempts,
            config.profile_retry_delay(),
        ))
        .with_home_path(config.home_path.clone());

        let routes = RouteGuard::new(Arc::clone(&store), clock.clone(), Arc::clone(&navigator));

        let context = Self {
            config,
            store,
            navigator,
            clock,
            api,
            coordinator,
            routes,
        };
        Ok((context, redirects))
    }

    /// A fresh expiry notice using the configured threshold.
    pub fn warning(&self) -> ExpiryWarning {
        ExpiryWarning::new(self.config.warning_before())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_components_follow_config() {
        let config = Config {
            api_base_url: "http://billing.internal:9000/".to_string(),
            tick_interval_ms: 250,
            warning_before_secs: 120,
            ..Config::default()
        };

        let (context, _redirects) =
            SessionContext::with_store(config, Arc::new(TokenStore::in_memory())).unwrap();

        assert_eq!(context.api.base_url(), "http://billing.internal:9000");
        assert_eq!(context.clock.period(), Duration::from_millis(250));
        assert_eq!(context.warning().threshold(), Duration::from_secs(120));
        assert!(!context.coordinator.is_logged_in());
        assert!(Arc::ptr_eq(context.coordinator.store(), &context.store));
    }
}
