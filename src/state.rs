use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::directions::DirectionsClient;
use crate::fetch::{ReqwestTransport, RetryPolicy, RetryingFetcher};
use crate::sampler::RouteSampler;

#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    cache: Arc<DashMap<String, CachedResponse>>,
    transport: ReqwestTransport,
    directions: DirectionsClient,
}

struct CachedResponse {
    body: String,
    inserted_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let client = reqwest::Client::new();
        let transport = ReqwestTransport::new(client.clone(), config.openaq_api_key.as_deref());
        let directions = DirectionsClient::new(
            client,
            config.mapbox_base_url.clone(),
            config.mapbox_access_token.clone(),
        );
        Self {
            config: Arc::new(config),
            cache: Arc::new(DashMap::new()),
            transport,
            directions,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &ReqwestTransport {
        &self.transport
    }

    pub fn directions(&self) -> &DirectionsClient {
        &self.directions
    }

    pub fn fetcher(&self) -> RetryingFetcher<ReqwestTransport> {
        RetryingFetcher::new(self.transport.clone(), RetryPolicy::from_config(&self.config))
    }

    pub fn sampler(&self) -> RouteSampler<ReqwestTransport> {
        RouteSampler::new(self.fetcher(), self.config.openaq_base_url.clone())
            .with_request_delay(self.config.sample_delay)
    }

    pub fn cache_insert(&self, url: String, body: String) {
        self.cache.insert(
            url,
            CachedResponse {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn cache_get(&self, url: &str) -> Option<String> {
        let ttl = self.config.cache_ttl;
        self.cache
            .get(url)
            .filter(|entry| entry.inserted_at.elapsed() < ttl)
            .map(|entry| entry.body.clone())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn evict_expired(&self, ttl: Duration) {
        let now = Instant::now();
        self.cache.retain(|_, cached| {
            now.duration_since(cached.inserted_at) < ttl
        });
        tracing::info!("Cache eviction complete. Current size: {}", self.cache.len());
    }
}
