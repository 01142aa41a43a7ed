//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use meter_core::PricingTable;
use reqwest::Client;

use crate::balance_cache::BalanceCache;
use crate::billing_client::BillingClient;
use crate::config::Config;
use crate::reporter::UsageReporter;

/// Application state shared across handlers, constructed once in `main` and
/// held for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pricing: Arc<PricingTable>,
    pub balance_cache: Arc<BalanceCache>,
    pub reporter: Arc<UsageReporter>,
    /// Client used for the upstream Anthropic API forward.
    pub upstream_client: Client,
}

impl AppState {
    /// # Panics
    ///
    /// Panics if the upstream HTTP client cannot be built, which only
    /// happens if the TLS backend fails to initialize.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let timeout = Duration::from_secs(config.request_timeout_seconds);

        let billing_client = Arc::new(BillingClient::new(config.domestic_api_url.clone(), timeout));

        let balance_cache = Arc::new(BalanceCache::new(Arc::clone(&billing_client)));
        let reporter = Arc::new(UsageReporter::new(billing_client, Arc::clone(&balance_cache)));

        let upstream_client = Client::builder().timeout(timeout).build().expect("failed to build HTTP client");

        Self { config, pricing: Arc::new(PricingTable::default()), balance_cache, reporter, upstream_client }
    }

    /// Spawn the C3 janitor and C5 retry scanner as detached background
    /// loops owned by this state's lifetime.
    pub fn spawn_background_tasks(&self) {
        let balance_cache = Arc::clone(&self.balance_cache);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(crate::balance_cache::JANITOR_INTERVAL);
            loop {
                interval.tick().await;
                balance_cache.sweep().await;
            }
        });

        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(crate::reporter::RETRY_SCAN_INTERVAL);
            loop {
                interval.tick().await;
                reporter.scan().await;
            }
        });
    }
}
