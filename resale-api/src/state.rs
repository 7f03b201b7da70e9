use resale_core::{AccountService, CatalogService, EventBus, Repositories, SaleService};
use resale_store::RedisClient;
use std::sync::Arc;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct RateLimit {
    pub requests: i64,
    pub window_seconds: i64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests: 120,
            window_seconds: 60,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub sales: SaleService,
    pub events: EventBus,
    /// Rate limiting is skipped without Redis.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimit,
    pub metrics: Metrics,
    pub auth: AuthConfig,
}

impl AppState {
    pub fn new(repos: Repositories, events: EventBus, auth: AuthConfig) -> Result<Self, prometheus::Error> {
        Ok(Self {
            accounts: AccountService::new(repos.clone()),
            catalog: CatalogService::new(repos.clone(), events.clone()),
            sales: SaleService::new(repos, events.clone()),
            events,
            redis: None,
            rate_limit: RateLimit::default(),
            metrics: Metrics::new()?,
            auth,
        })
    }

    pub fn with_rate_limit(mut self, redis: Arc<RedisClient>, rate_limit: RateLimit) -> Self {
        self.redis = Some(redis);
        self.rate_limit = rate_limit;
        self
    }
}
