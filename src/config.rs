use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub cache_ttl: Duration,
    pub openaq_base_url: String,
    pub openaq_api_key: Option<String>,
    pub mapbox_base_url: String,
    pub mapbox_access_token: Option<String>,
    pub sample_points: usize,
    pub sample_delay: Duration,
    pub fetch_max_retries: u32,
    pub fetch_initial_backoff: Duration,
    pub fetch_retry_transient_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            cache_ttl: Duration::from_secs(3600),
            openaq_base_url: "https://api.openaq.org".to_string(),
            openaq_api_key: None,
            mapbox_base_url: "https://api.mapbox.com".to_string(),
            mapbox_access_token: None,
            sample_points: 10,
            sample_delay: Duration::from_millis(300),
            fetch_max_retries: 3,
            fetch_initial_backoff: Duration::from_millis(1000),
            fetch_retry_transient_only: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse("PORT").unwrap_or(defaults.port);

        let cache_ttl_seconds = env_parse("CACHE_TTL_SECONDS").unwrap_or(3600);

        let openaq_base_url = env_string("OPENAQ_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.openaq_base_url);
        let mapbox_base_url = env_string("MAPBOX_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.mapbox_base_url);

        let sample_delay_ms = env_parse("SAMPLE_DELAY_MS").unwrap_or(300);
        let backoff_ms = env_parse("FETCH_INITIAL_BACKOFF_MS").unwrap_or(1000);

        let fetch_retry_transient_only = env_string("FETCH_RETRY_TRANSIENT_ONLY")
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self {
            port,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            openaq_base_url,
            openaq_api_key: env_string("OPENAQ_API_KEY"),
            mapbox_base_url,
            mapbox_access_token: env_string("MAPBOX_ACCESS_TOKEN"),
            sample_points: env_parse("SAMPLE_POINTS").unwrap_or(defaults.sample_points),
            sample_delay: Duration::from_millis(sample_delay_ms),
            fetch_max_retries: env_parse("FETCH_MAX_RETRIES").unwrap_or(defaults.fetch_max_retries),
            fetch_initial_backoff: Duration::from_millis(backoff_ms),
            fetch_retry_transient_only,
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}
